//! Pyramid build orchestration.
//!
//! [`PipelineDriver`] runs one build end to end:
//!
//! 1. validate the metadata and recompute its levels
//! 2. plan partitions from the store's block-size hint
//! 3. read the finest level and clear stale output
//! 4. warp every finest tile into fragments
//! 5. group fragments by output tile and route them to partitions
//! 6. stitch and write every partition
//! 7. persist the metadata, only if every partition succeeded
//!
//! Builds are deterministic, so re-running a failed build is always safe.

mod context;
mod stages;

pub use context::BuildContext;
pub use stages::PartitionGroups;

use crate::engine::ExecutionEngine;
use crate::error::Result;
use crate::metadata::PyramidMetadata;
use crate::partition::PartitionPlan;
use crate::stitch::CoveragePolicy;
use crate::storage::{PartitionSummary, TileStore};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Driver settings that do not belong to the engine or the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub coverage: CoveragePolicy,
}

/// Output of one zoom level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelReport {
    pub tiles: usize,
    pub partitions: usize,
    pub bytes: u64,
}

/// Summary of a finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub finest_tiles: usize,
    pub fragments: usize,
    pub levels: BTreeMap<u8, LevelReport>,
}

impl BuildReport {
    fn new(finest_tiles: usize, fragments: usize, summaries: &[PartitionSummary]) -> Self {
        let mut levels: BTreeMap<u8, LevelReport> = BTreeMap::new();
        for summary in summaries {
            let level = levels.entry(summary.zoom).or_default();
            level.tiles += summary.tiles;
            level.partitions += 1;
            level.bytes += summary.bytes;
        }
        Self {
            finest_tiles,
            fragments,
            levels,
        }
    }

    /// Output tiles written across all levels.
    pub fn total_tiles(&self) -> usize {
        self.levels.values().map(|l| l.tiles).sum()
    }

    pub fn total_partitions(&self) -> usize {
        self.levels.values().map(|l| l.partitions).sum()
    }
}

/// Builds pyramids with an engine and a store.
pub struct PipelineDriver<E, S> {
    engine: E,
    store: S,
    options: BuildOptions,
}

impl<E, S> PipelineDriver<E, S>
where
    E: ExecutionEngine,
    S: TileStore,
{
    pub fn new(engine: E, store: S, options: BuildOptions) -> Self {
        Self {
            engine,
            store,
            options,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> BuildOptions {
        self.options
    }

    /// Builds every level coarser than `metadata.max_zoom()` from the finest
    /// level already in the store.
    ///
    /// The metadata is written to the store only after every partition of
    /// every level has been published. On error nothing is written for the
    /// failing partitions and the metadata is left absent.
    #[instrument(
        skip_all,
        fields(root = %self.store.root().display(), max_zoom = metadata.max_zoom())
    )]
    pub fn build(&self, metadata: PyramidMetadata) -> Result<BuildReport> {
        let started = Instant::now();
        let metadata = metadata.with_levels()?;

        let block_size = self.store.default_block_size(self.store.root());
        let plan = PartitionPlan::build(&metadata, block_size)?;
        info!(
            tile_size = metadata.tile_size(),
            pixel_type = %metadata.pixel_type(),
            block_size,
            tiles_per_partition = plan.tiles_per_partition(),
            partitions = plan.partition_count(),
            coverage = %self.options.coverage,
            "Starting pyramid build"
        );

        let finest = self.store.read_level(metadata.max_zoom())?;
        if finest.is_empty() {
            warn!(zoom = metadata.max_zoom(), "Finest level holds no tiles");
        }
        self.clear_previous_output(&metadata)?;

        let finest_tiles = finest.len();
        let ctx = BuildContext::new(
            self.engine.broadcast(metadata),
            self.engine.broadcast(plan),
            self.options.coverage,
            &self.store,
        );

        let fragments = stages::warp_stage(&self.engine, &ctx, finest)?;
        let fragment_count = fragments.len();
        let grouped = stages::group_stage(&self.engine, &ctx, fragments)?;
        let summaries = stages::write_stage(&self.engine, &ctx, grouped)?;

        ctx.metadata.save(&self.store.metadata_path())?;

        let report = BuildReport::new(finest_tiles, fragment_count, &summaries);
        for (zoom, level) in &report.levels {
            info!(
                zoom,
                tiles = level.tiles,
                partitions = level.partitions,
                bytes = level.bytes,
                "Level written"
            );
        }
        info!(
            finest_tiles,
            fragments = fragment_count,
            tiles = report.total_tiles(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pyramid build complete"
        );
        Ok(report)
    }

    /// Removes the descriptor and every output level of an earlier build.
    fn clear_previous_output(&self, metadata: &PyramidMetadata) -> Result<()> {
        match fs::remove_file(self.store.metadata_path()) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        for zoom in metadata.output_zooms() {
            self.store.clear_level(zoom)?;
        }
        Ok(())
    }
}
