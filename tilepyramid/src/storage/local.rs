//! Directory-backed tile store.
//!
//! ```text
//! <root>/metadata.json
//! <root>/<zoom>/part-00000
//! <root>/<zoom>/part-00000.index
//! ```

use super::tile_file::{TileFileReader, TileFileWriter};
use super::{BlockSizeHint, PartitionSummary, SortedAppendSink, TileStore};
use crate::error::{PyramidError, Result};
use crate::metadata::METADATA_FILE;
use crate::raster::RasterPayload;
use crate::tile::TileId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Partition size used when none is configured (128 MB).
pub const DEFAULT_BLOCK_SIZE: u64 = 128 * 1024 * 1024;

/// Default zlib level for tile records.
pub const DEFAULT_COMPRESSION: u32 = 6;

const PARTITION_PREFIX: &str = "part-";

/// Tile store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalTileStore {
    root: PathBuf,
    block_size: u64,
    compression: u32,
}

impl LocalTileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            block_size: DEFAULT_BLOCK_SIZE,
            compression: DEFAULT_COMPRESSION,
        }
    }

    /// Overrides the partition size hint.
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Sets the zlib level (0-9) for new records.
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = level.min(9);
        self
    }

    pub fn compression(&self) -> u32 {
        self.compression
    }

    pub fn level_dir(&self, zoom: u8) -> PathBuf {
        self.root.join(zoom.to_string())
    }

    pub fn partition_path(&self, zoom: u8, partition: usize) -> PathBuf {
        self.level_dir(zoom)
            .join(format!("{}{:05}", PARTITION_PREFIX, partition))
    }

    /// Published partition files of a level, in partition order.
    pub fn partition_files(&self, zoom: u8) -> Result<Vec<PathBuf>> {
        let dir = self.level_dir(zoom);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_partition = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| {
                    n.starts_with(PARTITION_PREFIX)
                        && n[PARTITION_PREFIX.len()..].bytes().all(|b| b.is_ascii_digit())
                })
                .unwrap_or(false);
            if is_partition {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Writes a complete level as a single partition, sorting the tiles first.
    ///
    /// Used to load the finest zoom before a build.
    pub fn import_level(
        &self,
        zoom: u8,
        mut tiles: Vec<(TileId, RasterPayload)>,
    ) -> Result<PartitionSummary> {
        tiles.sort_by_key(|(id, _)| *id);
        self.clear_level(zoom)?;
        let mut sink = self.open_sink(zoom, 0)?;
        for (id, payload) in &tiles {
            if let Err(e) = sink.append(*id, payload) {
                sink.abort()?;
                return Err(e);
            }
        }
        sink.close()
    }
}

impl BlockSizeHint for LocalTileStore {
    fn default_block_size(&self, _path: &Path) -> u64 {
        self.block_size
    }
}

impl TileStore for LocalTileStore {
    type Sink = LocalSink;

    fn root(&self) -> &Path {
        &self.root
    }

    fn open_sink(&self, zoom: u8, partition: usize) -> Result<LocalSink> {
        let writer = TileFileWriter::create(&self.partition_path(zoom, partition), self.compression)?;
        Ok(LocalSink {
            zoom,
            partition,
            writer: Some(writer),
            first: None,
            last: None,
        })
    }

    fn read_level(&self, zoom: u8) -> Result<Vec<(TileId, RasterPayload)>> {
        let mut tiles = Vec::new();
        for path in self.partition_files(zoom)? {
            let reader = TileFileReader::open(&path)?;
            for record in reader.iter() {
                tiles.push(record?);
            }
        }
        tiles.sort_by_key(|(id, _)| *id);
        Ok(tiles)
    }

    fn clear_level(&self, zoom: u8) -> Result<()> {
        let dir = self.level_dir(zoom);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(zoom, path = %dir.display(), "Cleared level");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }
}

/// Sink writing one partition file of a [`LocalTileStore`].
///
/// Dropping an open sink discards its staging files.
#[derive(Debug)]
pub struct LocalSink {
    zoom: u8,
    partition: usize,
    writer: Option<TileFileWriter>,
    first: Option<TileId>,
    last: Option<TileId>,
}

fn sink_closed() -> PyramidError {
    io::Error::new(io::ErrorKind::BrokenPipe, "partition sink is already closed").into()
}

impl SortedAppendSink for LocalSink {
    fn append(&mut self, key: TileId, payload: &RasterPayload) -> Result<()> {
        if let Some(previous) = self.last {
            if key <= previous {
                return Err(PyramidError::OrderingViolation {
                    zoom: self.zoom,
                    partition: self.partition,
                    previous,
                    key,
                });
            }
        }
        self.writer
            .as_mut()
            .ok_or_else(sink_closed)?
            .append(key, payload)?;
        self.first.get_or_insert(key);
        self.last = Some(key);
        Ok(())
    }

    fn close(mut self) -> Result<PartitionSummary> {
        let writer = self.writer.take().ok_or_else(sink_closed)?;
        let file = writer.finish()?;
        debug!(
            zoom = self.zoom,
            partition = self.partition,
            tiles = file.records,
            bytes = file.bytes,
            "Partition published"
        );
        Ok(PartitionSummary {
            zoom: self.zoom,
            partition: self.partition,
            tiles: file.records,
            bytes: file.bytes,
            first: self.first,
            last: self.last,
        })
    }

    fn abort(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            debug!(zoom = self.zoom, partition = self.partition, "Partition aborted");
            writer.discard()?;
        }
        Ok(())
    }
}

impl Drop for LocalSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            warn!(
                zoom = self.zoom,
                partition = self.partition,
                path = %writer.path().display(),
                "Partition sink dropped without close, discarding"
            );
            if let Err(e) = writer.discard() {
                warn!(error = %e, "Failed to remove staging files");
            }
        }
    }
}
