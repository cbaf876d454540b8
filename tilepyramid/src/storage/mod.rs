//! Tile storage.
//!
//! The pipeline talks to storage through three seams:
//!
//! - [`SortedAppendSink`] receives the tiles of one partition in ascending id
//!   order and publishes them atomically on close.
//! - [`TileStore`] opens sinks, reads a finished level and clears stale
//!   output.
//! - [`BlockSizeHint`] tells the partition planner how much data one
//!   partition should hold.
//!
//! [`LocalTileStore`] implements all three on a local directory tree.

mod local;
pub mod tile_file;

pub use local::{LocalSink, LocalTileStore, DEFAULT_BLOCK_SIZE, DEFAULT_COMPRESSION};
pub use tile_file::{TileFileReader, TileFileWriter};

use crate::error::Result;
use crate::raster::RasterPayload;
use crate::tile::TileId;
use std::path::{Path, PathBuf};

/// What one closed partition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSummary {
    pub zoom: u8,
    pub partition: usize,
    pub tiles: usize,
    pub bytes: u64,
    pub first: Option<TileId>,
    pub last: Option<TileId>,
}

/// Writer for one partition of one zoom level.
///
/// Keys must be strictly increasing. Nothing becomes visible to readers until
/// [`close`](Self::close) succeeds; [`abort`](Self::abort) discards
/// everything appended so far.
pub trait SortedAppendSink: Send {
    /// Appends one tile. Fails with `OrderingViolation` unless `key` is
    /// greater than every key appended before.
    fn append(&mut self, key: TileId, payload: &RasterPayload) -> Result<()>;

    /// Publishes the partition.
    fn close(self) -> Result<PartitionSummary>;

    /// Discards the partition.
    fn abort(self) -> Result<()>;
}

/// Preferred partition size for data written under a path.
pub trait BlockSizeHint {
    fn default_block_size(&self, path: &Path) -> u64;
}

/// Persistent home of a pyramid's levels and metadata.
pub trait TileStore: BlockSizeHint + Send + Sync {
    type Sink: SortedAppendSink;

    /// Root under which levels are written.
    fn root(&self) -> &Path;

    /// Opens a fresh sink for `partition` of `zoom`, replacing any earlier
    /// output of that partition once closed.
    fn open_sink(&self, zoom: u8, partition: usize) -> Result<Self::Sink>;

    /// All tiles of a level in ascending id order.
    fn read_level(&self, zoom: u8) -> Result<Vec<(TileId, RasterPayload)>>;

    /// Removes every partition of a level.
    fn clear_level(&self, zoom: u8) -> Result<()>;

    /// Where the pyramid descriptor lives.
    fn metadata_path(&self) -> PathBuf;
}
