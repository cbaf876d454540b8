//! Stitcher: composites all fragments of one output tile.
//!
//! Fragments are pasted at the pixel offset between their origin tile's
//! upper-left corner and the output tile's upper-left corner. A coverage mask
//! records which pixels have been written, so overlapping fragments and
//! uncovered pixels are detected rather than silently blended or left blank.

use crate::error::{ConsistencyError, PyramidError, Result};
use crate::metadata::PyramidMetadata;
use crate::raster::{Pixel, RasterData, RasterPayload};
use crate::tile::{
    decode_tile_id, fragment_size_at_zoom, lat_lon_to_pixel_upper_left, tile_to_extent,
    PixelCoord, TileAddress, TileId,
};
use crate::warp::Fragment;
use std::fmt;
use std::str::FromStr;

/// How uncovered pixels are treated once a group has been composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoveragePolicy {
    /// Every pixel inside the dataset's footprint must be covered.
    #[default]
    Complete,
    /// Missing finest tiles are allowed and leave no-data behind.
    Sparse,
}

impl fmt::Display for CoveragePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoveragePolicy::Complete => write!(f, "complete"),
            CoveragePolicy::Sparse => write!(f, "sparse"),
        }
    }
}

impl FromStr for CoveragePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "complete" => Ok(CoveragePolicy::Complete),
            "sparse" => Ok(CoveragePolicy::Sparse),
            other => Err(format!("unknown coverage policy '{}'", other)),
        }
    }
}

/// A finished tile of one output zoom level.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTile {
    pub id: TileId,
    pub zoom: u8,
    pub payload: RasterPayload,
}

/// Pixel rectangle inside one tile, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

/// Composites every fragment addressed to `(zoom, target)` into one tile.
///
/// The result does not depend on the order of `fragments`.
pub fn stitch(
    metadata: &PyramidMetadata,
    zoom: u8,
    target: TileId,
    fragments: &[Fragment],
    policy: CoveragePolicy,
) -> Result<OutputTile> {
    let tile_size = metadata.tile_size();
    let frag_size = fragment_size_at_zoom(tile_size, metadata.max_zoom(), zoom);

    let target_extent = tile_to_extent(target, zoom, tile_size)?;
    let (lat, lon) = target_extent.upper_left();
    let corner = lat_lon_to_pixel_upper_left(lat, lon, zoom, tile_size)?;

    let mut payload = RasterPayload::filled(metadata.pixel_type(), tile_size, metadata.nodata());
    let mut mask = vec![false; tile_size as usize * tile_size as usize];

    for fragment in fragments {
        check_fragment(metadata, zoom, target, frag_size, fragment)?;
        let (dx, dy) = fragment_offset(metadata, zoom, corner, fragment)?;

        let size = i64::from(tile_size);
        let fs = i64::from(frag_size);
        if dx < 0 || dy < 0 || dx + fs > size || dy + fs > size {
            return Err(ConsistencyError::FragmentOutOfTile {
                origin: fragment.origin,
                target,
                dx,
                dy,
            }
            .into());
        }

        let paste = Paste {
            tile_size: tile_size as usize,
            frag_size: frag_size as usize,
            dx: dx as usize,
            dy: dy as usize,
            origin: fragment.origin,
            target,
        };
        paste_fragment(&mut payload, &fragment.payload, &mut mask, &paste)?;
    }

    if policy == CoveragePolicy::Complete {
        let addr = decode_tile_id(target)?;
        if let Some(region) = expected_coverage(metadata, &addr, frag_size)? {
            check_gaps(&mask, tile_size, region, target)?;
        }
    }

    Ok(OutputTile {
        id: target,
        zoom,
        payload,
    })
}

/// Fails with a gap if the finest dataset covers any pixel of `target`.
///
/// For output tiles that received no fragments at all, which never reach
/// [`stitch`].
pub fn check_unfilled(metadata: &PyramidMetadata, target: TileId) -> Result<()> {
    let addr = decode_tile_id(target)?;
    let tile_size = metadata.tile_size();
    let frag_size = fragment_size_at_zoom(tile_size, metadata.max_zoom(), addr.zoom);
    match expected_coverage(metadata, &addr, frag_size)? {
        Some(region) => {
            let mask = vec![false; tile_size as usize * tile_size as usize];
            check_gaps(&mask, tile_size, region, target)
        }
        None => Ok(()),
    }
}

fn check_fragment(
    metadata: &PyramidMetadata,
    zoom: u8,
    target: TileId,
    frag_size: u32,
    fragment: &Fragment,
) -> Result<()> {
    if fragment.zoom != zoom {
        return Err(ConsistencyError::ZoomMismatch {
            tile: fragment.origin,
            expected: zoom,
            actual: fragment.zoom,
        }
        .into());
    }
    if fragment.target != target {
        return Err(ConsistencyError::TargetMismatch {
            origin: fragment.origin,
            expected: target,
            actual: fragment.target,
        }
        .into());
    }
    if fragment.payload.size() != frag_size {
        return Err(ConsistencyError::SizeMismatch {
            tile: fragment.origin,
            expected: frag_size,
            actual: fragment.payload.size(),
        }
        .into());
    }
    if fragment.payload.pixel_type() != metadata.pixel_type() {
        return Err(pixel_type_mismatch(metadata, fragment));
    }
    Ok(())
}

fn pixel_type_mismatch(metadata: &PyramidMetadata, fragment: &Fragment) -> PyramidError {
    ConsistencyError::PixelTypeMismatch {
        tile: fragment.origin,
        expected: metadata.pixel_type().to_string(),
        actual: fragment.payload.pixel_type().to_string(),
    }
    .into()
}

/// Offset of a fragment's upper-left pixel from the target's upper-left pixel.
fn fragment_offset(
    metadata: &PyramidMetadata,
    zoom: u8,
    corner: PixelCoord,
    fragment: &Fragment,
) -> Result<(i64, i64)> {
    let origin_extent = tile_to_extent(fragment.origin, metadata.max_zoom(), metadata.tile_size())?;
    let (lat, lon) = origin_extent.upper_left();
    let pixel = lat_lon_to_pixel_upper_left(lat, lon, zoom, metadata.tile_size())?;
    Ok((
        pixel.x as i64 - corner.x as i64,
        pixel.y as i64 - corner.y as i64,
    ))
}

struct Paste {
    tile_size: usize,
    frag_size: usize,
    dx: usize,
    dy: usize,
    origin: TileId,
    target: TileId,
}

fn paste_fragment(
    payload: &mut RasterPayload,
    fragment: &RasterPayload,
    mask: &mut [bool],
    paste: &Paste,
) -> Result<()> {
    match (payload.data_mut(), fragment.data()) {
        (RasterData::U8(dst), RasterData::U8(src)) => copy_pixels(dst, src, mask, paste),
        (RasterData::I16(dst), RasterData::I16(src)) => copy_pixels(dst, src, mask, paste),
        (RasterData::U16(dst), RasterData::U16(src)) => copy_pixels(dst, src, mask, paste),
        (RasterData::I32(dst), RasterData::I32(src)) => copy_pixels(dst, src, mask, paste),
        (RasterData::F32(dst), RasterData::F32(src)) => copy_pixels(dst, src, mask, paste),
        (RasterData::F64(dst), RasterData::F64(src)) => copy_pixels(dst, src, mask, paste),
        (dst, src) => Err(ConsistencyError::PixelTypeMismatch {
            tile: paste.origin,
            expected: dst.pixel_type().to_string(),
            actual: src.pixel_type().to_string(),
        }
        .into()),
    }
}

fn copy_pixels<T: Pixel>(dst: &mut [T], src: &[T], mask: &mut [bool], paste: &Paste) -> Result<()> {
    for y in 0..paste.frag_size {
        let row = (paste.dy + y) * paste.tile_size + paste.dx;
        for x in 0..paste.frag_size {
            let i = row + x;
            if mask[i] {
                return Err(ConsistencyError::Overlap {
                    origin: paste.origin,
                    target: paste.target,
                    x: (paste.dx + x) as u32,
                    y: (paste.dy + y) as u32,
                }
                .into());
            }
            mask[i] = true;
            dst[i] = src[y * paste.frag_size + x];
        }
    }
    Ok(())
}

/// Pixels of the target tile that the dataset's finest tiles cover.
fn expected_coverage(
    metadata: &PyramidMetadata,
    addr: &TileAddress,
    frag_size: u32,
) -> Result<Option<Region>> {
    let depth = metadata.max_zoom() - addr.zoom;
    let span = 1u64 << depth;
    let finest = metadata.level(metadata.max_zoom())?.tile_bounds;

    let first_col = addr.col * span;
    let first_row = addr.row * span;
    let c0 = first_col.max(finest.min_col);
    let c1 = (first_col + span - 1).min(finest.max_col);
    let r0 = first_row.max(finest.min_row);
    let r1 = (first_row + span - 1).min(finest.max_row);
    if c0 > c1 || r0 > r1 {
        return Ok(None);
    }

    let fs = u64::from(frag_size);
    Ok(Some(Region {
        x0: ((c0 - first_col) * fs) as u32,
        y0: ((r0 - first_row) * fs) as u32,
        x1: ((c1 + 1 - first_col) * fs) as u32,
        y1: ((r1 + 1 - first_row) * fs) as u32,
    }))
}

fn check_gaps(mask: &[bool], tile_size: u32, region: Region, target: TileId) -> Result<()> {
    let mut missing = 0usize;
    let mut first = None;
    for y in region.y0..region.y1 {
        for x in region.x0..region.x1 {
            if !mask[y as usize * tile_size as usize + x as usize] {
                missing += 1;
                first.get_or_insert((x, y));
            }
        }
    }
    match first {
        None => Ok(()),
        Some((x, y)) => Err(ConsistencyError::Gap {
            target,
            missing,
            x,
            y,
        }
        .into()),
    }
}
