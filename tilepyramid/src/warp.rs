//! Warper: downsamples one finest-zoom tile into a chain of fragments.
//!
//! ```text
//!   finest tile (zoom N, tile_size px)
//!        │ box filter
//!        ▼
//!   fragment @ N-1 (tile_size/2 px) ──► target tile containing the corner
//!        │ box filter
//!        ▼
//!   fragment @ N-2 (tile_size/4 px) ──► target tile containing the corner
//!        ⋮
//!   fragment @ 1
//! ```
//!
//! Each step resamples the previous step's payload, not the original tile,
//! so the chain is a fold over zoom levels. The target of every fragment is
//! the tile containing the finest tile's upper-left corner at that zoom.

use crate::error::{ConsistencyError, Result};
use crate::metadata::PyramidMetadata;
use crate::raster::{downsample, RasterPayload};
use crate::tile::{
    decode_tile_id, encode_tile_id, fragment_size_at_zoom, lat_lon_to_tile_address,
    tile_to_extent, GeoExtent, TileId,
};

/// A finest tile's downsampled contribution to one coarser output tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Finest-zoom tile the fragment was derived from
    pub origin: TileId,
    /// Zoom level of the output tile
    pub zoom: u8,
    /// Output tile the fragment belongs to
    pub target: TileId,
    pub payload: RasterPayload,
}

impl Fragment {
    /// Grouping key: output zoom and tile.
    pub fn key(&self) -> (u8, TileId) {
        (self.zoom, self.target)
    }
}

/// Accumulator threaded through the zoom fold.
#[derive(Debug, Clone)]
struct WarpState {
    payload: RasterPayload,
    extent: GeoExtent,
}

/// Produces one fragment for every zoom from `max_zoom - 1` down to 1.
///
/// The input must be a finest-zoom tile inside the dataset bounds whose
/// payload matches the metadata's tile size and pixel type.
pub fn warp_tile(
    metadata: &PyramidMetadata,
    tile: TileId,
    payload: &RasterPayload,
) -> Result<Vec<Fragment>> {
    let max_zoom = metadata.max_zoom();
    check_finest_tile(metadata, tile, payload)?;

    let extent = tile_to_extent(tile, max_zoom, metadata.tile_size())?;
    let initial = WarpState {
        payload: payload.clone(),
        extent,
    };

    let (_, fragments) = (1..max_zoom).rev().try_fold(
        (initial, Vec::with_capacity(max_zoom.saturating_sub(1) as usize)),
        |(state, mut fragments), zoom| {
            let (next, fragment) = warp_step(metadata, tile, &state, zoom)?;
            fragments.push(fragment);
            Ok::<_, crate::error::PyramidError>((next, fragments))
        },
    )?;
    Ok(fragments)
}

/// One fold step: resample the previous payload to this zoom's fragment size.
fn warp_step(
    metadata: &PyramidMetadata,
    origin: TileId,
    state: &WarpState,
    zoom: u8,
) -> Result<(WarpState, Fragment)> {
    let tile_size = metadata.tile_size();
    let frag_size = fragment_size_at_zoom(tile_size, metadata.max_zoom(), zoom);

    // The footprint never changes, so the corner is the finest tile's corner.
    let (lat, lon) = state.extent.upper_left();
    let addr = lat_lon_to_tile_address(lat, lon, zoom, tile_size)?;
    let target = encode_tile_id(addr.col, addr.row, zoom)?;

    let payload = downsample(&state.payload, frag_size, metadata.nodata())?;
    let next = WarpState {
        payload: payload.clone(),
        extent: state.extent,
    };
    Ok((
        next,
        Fragment {
            origin,
            zoom,
            target,
            payload,
        },
    ))
}

fn check_finest_tile(
    metadata: &PyramidMetadata,
    tile: TileId,
    payload: &RasterPayload,
) -> Result<()> {
    let max_zoom = metadata.max_zoom();
    let addr = decode_tile_id(tile)?;
    if addr.zoom != max_zoom {
        return Err(ConsistencyError::ZoomMismatch {
            tile,
            expected: max_zoom,
            actual: addr.zoom,
        }
        .into());
    }
    if !metadata
        .level(max_zoom)?
        .tile_bounds
        .contains(addr.col, addr.row)
    {
        return Err(ConsistencyError::TileOutsideBounds {
            tile,
            zoom: max_zoom,
        }
        .into());
    }
    if payload.size() != metadata.tile_size() {
        return Err(ConsistencyError::SizeMismatch {
            tile,
            expected: metadata.tile_size(),
            actual: payload.size(),
        }
        .into());
    }
    if payload.pixel_type() != metadata.pixel_type() {
        return Err(ConsistencyError::PixelTypeMismatch {
            tile,
            expected: metadata.pixel_type().to_string(),
            actual: payload.pixel_type().to_string(),
        }
        .into());
    }
    Ok(())
}
