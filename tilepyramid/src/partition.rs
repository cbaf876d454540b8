//! Range partitioning of output tiles.
//!
//! The plan is built once per build and never changes afterwards. Every output
//! zoom is split into contiguous tile id ranges sized so that one partition's
//! records roughly fill one storage block:
//!
//! ```text
//! zoom 1   [0 ........ 2)
//! zoom 2   [2 ..... 5)[5 ..... 8)[8 .. 10)
//!           index 1    index 2    index 3
//! ```
//!
//! Partition indices are global, so a zoom's partitions never share an index
//! with another zoom's.

use crate::error::{PyramidError, Result};
use crate::metadata::PyramidMetadata;
use crate::tile::{encode_tile_id, TileId};
use std::collections::BTreeMap;
use std::ops::Range;

/// Estimated bytes a tile record costs beyond its pixels: file record header,
/// raster record header and index entry.
pub const RECORD_OVERHEAD: u64 = 12 + 5 + 16;

/// A contiguous run of tile ids written to one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRange {
    /// Global partition index
    pub index: usize,
    pub zoom: u8,
    /// First id of the range
    pub start: TileId,
    /// One past the last id of the range
    pub end: u64,
}

impl PartitionRange {
    pub fn contains(&self, id: TileId) -> bool {
        (self.start.value()..self.end).contains(&id.value())
    }
}

/// Immutable tile id to partition lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    tiles_per_partition: u64,
    ranges: Vec<PartitionRange>,
    by_zoom: BTreeMap<u8, Range<usize>>,
}

impl PartitionPlan {
    /// Builds the plan for every output zoom of `metadata`.
    pub fn build(metadata: &PyramidMetadata, block_size: u64) -> Result<Self> {
        let record = u64::from(metadata.tile_size()).pow(2)
            * metadata.pixel_type().bytes_per_pixel() as u64
            + RECORD_OVERHEAD;
        let tiles_per_partition = (block_size / record).max(1);

        let mut ranges = Vec::new();
        let mut by_zoom = BTreeMap::new();
        for zoom in metadata.output_zooms() {
            let first = ranges.len();
            let bounds = metadata.level(zoom)?.tile_bounds;
            let last_id = encode_tile_id(bounds.max_col, bounds.max_row, zoom)?;

            let mut starts = Vec::new();
            let mut nth = 0;
            while let Some(addr) = bounds.nth(nth, zoom) {
                starts.push(encode_tile_id(addr.col, addr.row, zoom)?);
                nth += tiles_per_partition;
            }
            for (i, start) in starts.iter().enumerate() {
                let end = match starts.get(i + 1) {
                    Some(next) => next.value(),
                    None => last_id.value() + 1,
                };
                ranges.push(PartitionRange {
                    index: ranges.len(),
                    zoom,
                    start: *start,
                    end,
                });
            }
            by_zoom.insert(zoom, first..ranges.len());
        }

        Ok(Self {
            tiles_per_partition,
            ranges,
            by_zoom,
        })
    }

    /// Partition index of an output tile.
    ///
    /// Defined for every id between the zoom's first and last tile.
    pub fn partition_of(&self, zoom: u8, id: TileId) -> Result<usize> {
        let ranges = self.ranges(zoom);
        let (Some(first), Some(last)) = (ranges.first(), ranges.last()) else {
            return Err(PyramidError::Partition(format!(
                "zoom {} has no partitions",
                zoom
            )));
        };
        if id < first.start || id.value() >= last.end {
            return Err(PyramidError::Partition(format!(
                "tile {} outside zoom {} id range [{}, {})",
                id, zoom, first.start, last.end
            )));
        }
        let pos = ranges.partition_point(|r| r.start <= id);
        Ok(ranges[pos - 1].index)
    }

    pub fn partition_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn tiles_per_partition(&self) -> u64 {
        self.tiles_per_partition
    }

    /// Ranges of one zoom in id order. Empty for zooms outside the plan.
    pub fn ranges(&self, zoom: u8) -> &[PartitionRange] {
        self.by_zoom
            .get(&zoom)
            .map(|span| &self.ranges[span.clone()])
            .unwrap_or(&[])
    }

    /// Every partition in index order.
    pub fn partitions(&self) -> impl Iterator<Item = (u8, &PartitionRange)> + '_ {
        self.ranges.iter().map(|r| (r.zoom, r))
    }

    pub fn zoom_of(&self, index: usize) -> Option<u8> {
        self.ranges.get(index).map(|r| r.zoom)
    }

    /// Zooms the plan covers, coarsest first.
    pub fn zooms(&self) -> impl Iterator<Item = u8> + '_ {
        self.by_zoom.keys().copied()
    }

    /// Number of partitions of one zoom.
    pub fn zoom_partition_count(&self, zoom: u8) -> usize {
        self.ranges(zoom).len()
    }
}
