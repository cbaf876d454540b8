//! Tile math for the global geographic grid.
//!
//! Converts between geographic coordinates (latitude/longitude), pixel space
//! and tile addresses at a given zoom level and tile size.
//!
//! # Grid
//!
//! ```text
//!  lon -180                              lon 180
//!     ┌────────────────┬────────────────┐ lat 90
//!     │  zoom 1: 0/0   │  zoom 1: 1/0   │
//!     │                │                │
//!     └────────────────┴────────────────┘ lat -90
//! ```
//!
//! Zoom `z` has `2^z` columns and `2^(z-1)` rows of square tiles. Row 0 is the
//! northernmost row and pixel y grows southwards. A point on a tile boundary
//! belongs to the tile whose half-open pixel interval `[min, max)` contains
//! it, so every tile owns its own upper-left corner.

mod types;

pub use types::{
    GeoExtent, PixelCoord, PixelRect, TileAddress, TileBounds, TileId, TileMathError, MAX_LAT,
    MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

/// Pixel coordinates closer than this to an integer snap onto it.
const PIXEL_EPSILON: f64 = 1e-6;

/// Number of tile columns at a zoom level.
#[inline]
pub fn tiles_wide(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Number of tile rows at a zoom level.
#[inline]
pub fn tiles_high(zoom: u8) -> u64 {
    1u64 << zoom.saturating_sub(1)
}

/// Degrees per pixel at a zoom level.
#[inline]
pub fn resolution(zoom: u8, tile_size: u32) -> f64 {
    tile_degrees(zoom) / tile_size as f64
}

/// Degrees spanned by one tile side at a zoom level.
#[inline]
fn tile_degrees(zoom: u8) -> f64 {
    180.0 / tiles_high(zoom) as f64
}

fn tiles_at(zoom: u8) -> u64 {
    tiles_wide(zoom) * tiles_high(zoom)
}

/// First tile id of a zoom level.
fn zoom_base(zoom: u8) -> u64 {
    (MIN_ZOOM..zoom).map(tiles_at).sum()
}

fn check_zoom(zoom: u8) -> Result<(), TileMathError> {
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        return Err(TileMathError::InvalidZoom(zoom));
    }
    Ok(())
}

fn check_tile_size(tile_size: u32) -> Result<(), TileMathError> {
    if tile_size == 0 {
        return Err(TileMathError::InvalidTileSize(tile_size));
    }
    Ok(())
}

fn check_lat_lon(lat: f64, lon: f64) -> Result<(), TileMathError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(TileMathError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(TileMathError::InvalidLongitude(lon));
    }
    Ok(())
}

#[inline]
fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() <= PIXEL_EPSILON {
        r
    } else {
        v
    }
}

/// Fractional pixel position of a point, before snapping.
#[inline]
fn pixel_position(lat: f64, lon: f64, zoom: u8, tile_size: u32) -> (f64, f64) {
    let res = resolution(zoom, tile_size);
    ((lon - MIN_LON) / res, (MAX_LAT - lat) / res)
}

/// Encodes a tile address into a [`TileId`].
///
/// Ids at a zoom start after all ids of coarser zooms and follow row-major
/// order within the zoom.
pub fn encode_tile_id(col: u64, row: u64, zoom: u8) -> Result<TileId, TileMathError> {
    check_zoom(zoom)?;
    if col >= tiles_wide(zoom) || row >= tiles_high(zoom) {
        return Err(TileMathError::OutsideGrid { col, row, zoom });
    }
    Ok(TileId(zoom_base(zoom) + row * tiles_wide(zoom) + col))
}

/// Decodes a [`TileId`] back into its tile address.
pub fn decode_tile_id(id: TileId) -> Result<TileAddress, TileMathError> {
    let mut base = 0u64;
    for zoom in MIN_ZOOM..=MAX_ZOOM {
        let count = tiles_at(zoom);
        if id.0 < base + count {
            let offset = id.0 - base;
            return Ok(TileAddress {
                col: offset % tiles_wide(zoom),
                row: offset / tiles_wide(zoom),
                zoom,
            });
        }
        base += count;
    }
    Err(TileMathError::InvalidTileId(id.0))
}

/// Converts a tile id to its geographic extent.
///
/// Fails if `zoom` is not the zoom level encoded in the id.
pub fn tile_to_extent(id: TileId, zoom: u8, tile_size: u32) -> Result<GeoExtent, TileMathError> {
    check_tile_size(tile_size)?;
    let addr = decode_tile_id(id)?;
    if addr.zoom != zoom {
        return Err(TileMathError::ZoomMismatch {
            id: id.0,
            expected: zoom,
            actual: addr.zoom,
        });
    }
    Ok(address_to_extent(&addr))
}

/// Geographic extent of a tile address.
pub fn address_to_extent(addr: &TileAddress) -> GeoExtent {
    let deg = tile_degrees(addr.zoom);
    let xmin = MIN_LON + addr.col as f64 * deg;
    let ymax = MAX_LAT - addr.row as f64 * deg;
    GeoExtent::new(xmin, ymax - deg, xmin + deg, ymax)
}

/// Converts a geographic point to the pixel that contains it.
///
/// Points on the world's east or south edge clamp into the last pixel column
/// or row.
pub fn lat_lon_to_pixel_upper_left(
    lat: f64,
    lon: f64,
    zoom: u8,
    tile_size: u32,
) -> Result<PixelCoord, TileMathError> {
    check_lat_lon(lat, lon)?;
    check_zoom(zoom)?;
    check_tile_size(tile_size)?;

    let (px, py) = pixel_position(lat, lon, zoom, tile_size);
    let max_x = tiles_wide(zoom) * tile_size as u64 - 1;
    let max_y = tiles_high(zoom) * tile_size as u64 - 1;

    Ok(PixelCoord {
        x: (snap(px).floor().max(0.0) as u64).min(max_x),
        y: (snap(py).floor().max(0.0) as u64).min(max_y),
    })
}

/// Converts a geographic point to the address of the tile that contains it.
pub fn lat_lon_to_tile_address(
    lat: f64,
    lon: f64,
    zoom: u8,
    tile_size: u32,
) -> Result<TileAddress, TileMathError> {
    let pixel = lat_lon_to_pixel_upper_left(lat, lon, zoom, tile_size)?;
    let size = tile_size as u64;
    Ok(TileAddress {
        col: pixel.x / size,
        row: pixel.y / size,
        zoom,
    })
}

/// Converts a geographic extent to the pixel rectangle it touches.
///
/// The rectangle is always at least one pixel wide and tall.
pub fn extent_to_pixel_range(
    extent: &GeoExtent,
    zoom: u8,
    tile_size: u32,
) -> Result<PixelRect, TileMathError> {
    extent.validate()?;
    check_zoom(zoom)?;
    check_tile_size(tile_size)?;

    let (left, top) = pixel_position(extent.ymax, extent.xmin, zoom, tile_size);
    let (right, bottom) = pixel_position(extent.ymin, extent.xmax, zoom, tile_size);
    let world_w = tiles_wide(zoom) * tile_size as u64;
    let world_h = tiles_high(zoom) * tile_size as u64;

    let x0 = (snap(left).floor().max(0.0) as u64).min(world_w - 1);
    let y0 = (snap(top).floor().max(0.0) as u64).min(world_h - 1);
    let x1 = (snap(right).ceil() as u64).clamp(x0 + 1, world_w);
    let y1 = (snap(bottom).ceil() as u64).clamp(y0 + 1, world_h);

    Ok(PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// Converts a geographic extent to the inclusive range of tiles it intersects.
pub fn extent_to_tile_range(
    extent: &GeoExtent,
    zoom: u8,
    tile_size: u32,
) -> Result<TileBounds, TileMathError> {
    let rect = extent_to_pixel_range(extent, zoom, tile_size)?;
    let size = tile_size as u64;
    Ok(TileBounds {
        min_col: rect.x / size,
        min_row: rect.y / size,
        max_col: (rect.x + rect.width - 1) / size,
        max_row: (rect.y + rect.height - 1) / size,
    })
}

/// Side length, in pixels, of one finest-zoom tile's contribution to an
/// output tile at `zoom`.
///
/// Halves with every zoom level below `max_zoom` and never drops below 1.
#[inline]
pub fn fragment_size_at_zoom(tile_size: u32, max_zoom: u8, zoom: u8) -> u32 {
    let depth = max_zoom.saturating_sub(zoom) as u32;
    tile_size.checked_shr(depth).unwrap_or(0).max(1)
}

#[cfg(test)]
mod tests;
