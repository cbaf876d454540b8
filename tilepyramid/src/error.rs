//! Error types for pyramid building.
//!
//! Every error aborts the smallest unit of work that raised it (one warp or
//! stitch task, or one partition write) and is handed back to the caller.
//! Nothing here is retried or corrected internally.

use crate::tile::{TileId, TileMathError};
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = PyramidError> = std::result::Result<T, E>;

/// Errors raised while building a pyramid.
#[derive(Debug, Error)]
pub enum PyramidError {
    /// Fragments and targets disagree on geometry or type
    #[error("consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    /// A key was appended to a partition out of order
    #[error(
        "ordering violation in zoom {zoom} partition {partition}: key {key} does not follow {previous}"
    )]
    OrderingViolation {
        zoom: u8,
        partition: usize,
        previous: TileId,
        key: TileId,
    },

    /// Pixel kind without defined numeric semantics
    #[error("unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    /// Missing or structurally invalid metadata
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Tile id not covered by the partition plan
    #[error("partition error: {0}")]
    Partition(String),

    #[error("tile math error: {0}")]
    TileMath(#[from] TileMathError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Geometry and type mismatches detected by the warper and stitcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("tile {tile} is at zoom {actual}, expected zoom {expected}")]
    ZoomMismatch {
        tile: TileId,
        expected: u8,
        actual: u8,
    },

    #[error("fragment from {origin} targets {actual}, but the group is {expected}")]
    TargetMismatch {
        origin: TileId,
        expected: TileId,
        actual: TileId,
    },

    #[error("raster for tile {tile} is {actual}px, expected {expected}px")]
    SizeMismatch {
        tile: TileId,
        expected: u32,
        actual: u32,
    },

    #[error("raster for tile {tile} holds {actual} pixels, expected {expected}")]
    PixelTypeMismatch {
        tile: TileId,
        expected: String,
        actual: String,
    },

    #[error("raster of side {size} needs {expected} pixels, got {actual}")]
    PixelCount {
        size: u32,
        expected: usize,
        actual: usize,
    },

    #[error("tile {tile} lies outside the dataset bounds at zoom {zoom}")]
    TileOutsideBounds { tile: TileId, zoom: u8 },

    #[error("fragment from {origin} at offset ({dx}, {dy}) does not fit in tile {target}")]
    FragmentOutOfTile {
        origin: TileId,
        target: TileId,
        dx: i64,
        dy: i64,
    },

    #[error("fragment from {origin} overlaps pixel ({x}, {y}) of tile {target}")]
    Overlap {
        origin: TileId,
        target: TileId,
        x: u32,
        y: u32,
    },

    #[error("tile {target} has {missing} uncovered pixels, first at ({x}, {y})")]
    Gap {
        target: TileId,
        missing: usize,
        x: u32,
        y: u32,
    },
}
