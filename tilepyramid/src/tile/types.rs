//! Tile and extent type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Geographic latitude range of the global grid
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Geographic longitude range of the global grid
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Supported zoom levels. Zoom 1 is a 2×1 grid of 180° tiles.
pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 30;

/// Geographic extent in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoExtent {
    /// Western edge (longitude)
    pub xmin: f64,
    /// Southern edge (latitude)
    pub ymin: f64,
    /// Eastern edge (longitude)
    pub xmax: f64,
    /// Northern edge (latitude)
    pub ymax: f64,
}

impl GeoExtent {
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// The whole world.
    pub const fn world() -> Self {
        Self::new(MIN_LON, MIN_LAT, MAX_LON, MAX_LAT)
    }

    /// Upper-left (north-west) corner as `(lat, lon)`.
    #[inline]
    pub fn upper_left(&self) -> (f64, f64) {
        (self.ymax, self.xmin)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Checks that the extent is non-empty and inside the world.
    pub fn validate(&self) -> Result<(), TileMathError> {
        let finite = [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|v| v.is_finite());
        if !finite
            || self.xmin >= self.xmax
            || self.ymin >= self.ymax
            || self.xmin < MIN_LON
            || self.xmax > MAX_LON
            || self.ymin < MIN_LAT
            || self.ymax > MAX_LAT
        {
            return Err(TileMathError::InvalidExtent(*self));
        }
        Ok(())
    }
}

impl fmt::Display for GeoExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

/// Single-integer tile identifier.
///
/// Ids encode the zoom level: every id at zoom `z` sorts before every id at
/// zoom `z + 1`, and within a zoom ids follow row-major scan order from the
/// north-west tile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TileId(pub u64);

impl TileId {
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tile address in the global geographic grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    /// X coordinate (west-east), 0 at lon -180
    pub col: u64,
    /// Y coordinate (north-south), 0 at lat 90
    pub row: u64,
    /// Zoom level (1-30)
    pub zoom: u8,
}

impl TileAddress {
    pub const fn new(col: u64, row: u64, zoom: u8) -> Self {
        Self { col, row, zoom }
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Inclusive rectangle of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBounds {
    pub min_col: u64,
    pub min_row: u64,
    pub max_col: u64,
    pub max_row: u64,
}

impl TileBounds {
    pub fn cols(&self) -> u64 {
        self.max_col - self.min_col + 1
    }

    pub fn rows(&self) -> u64 {
        self.max_row - self.min_row + 1
    }

    /// Number of tiles in the rectangle.
    pub fn count(&self) -> u64 {
        self.cols() * self.rows()
    }

    pub fn contains(&self, col: u64, row: u64) -> bool {
        (self.min_col..=self.max_col).contains(&col) && (self.min_row..=self.max_row).contains(&row)
    }

    /// Address of the `index`-th tile in row-major order, if any.
    pub fn nth(&self, index: u64, zoom: u8) -> Option<TileAddress> {
        if index >= self.count() {
            return None;
        }
        Some(TileAddress {
            col: self.min_col + index % self.cols(),
            row: self.min_row + index / self.cols(),
            zoom,
        })
    }
}

/// A pixel position at one zoom level, measured from the world's north-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoord {
    pub x: u64,
    pub y: u64,
}

/// Pixel rectangle at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u64,
    pub y: u64,
    pub width: u64,
    pub height: u64,
}

/// Errors that can occur during tile math.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TileMathError {
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Invalid zoom level: {0} (must be between 1 and 30)")]
    InvalidZoom(u8),

    #[error("Invalid tile size: {0}")]
    InvalidTileSize(u32),

    #[error("Tile {col}/{row} is outside the zoom {zoom} grid")]
    OutsideGrid { col: u64, row: u64, zoom: u8 },

    #[error("Tile id {0} is beyond the highest supported zoom")]
    InvalidTileId(u64),

    #[error("Tile id {id} belongs to zoom {actual}, not zoom {expected}")]
    ZoomMismatch { id: u64, expected: u8, actual: u8 },

    #[error("Invalid extent: {0}")]
    InvalidExtent(GeoExtent),
}
