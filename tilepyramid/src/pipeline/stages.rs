//! Build stages.
//!
//! ```text
//! finest tiles ──warp──► fragments ──group──► partitions ──stitch+write──► sinks
//! ```

use super::context::BuildContext;
use crate::engine::{ExecutionEngine, Partitioned};
use crate::error::Result;
use crate::partition::PartitionRange;
use crate::raster::RasterPayload;
use crate::stitch::{check_unfilled, stitch, CoveragePolicy};
use crate::storage::{PartitionSummary, SortedAppendSink, TileStore};
use crate::tile::TileId;
use crate::warp::{warp_tile, Fragment};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Fragments of one partition, keyed by `(zoom, target)`.
pub type PartitionGroups = HashMap<(u8, TileId), Vec<Fragment>>;

/// Warps every finest tile in parallel and flattens the fragment chains.
pub fn warp_stage<E, S>(
    engine: &E,
    ctx: &BuildContext<'_, S>,
    finest: Vec<(TileId, RasterPayload)>,
) -> Result<Vec<Fragment>>
where
    E: ExecutionEngine,
    S: TileStore,
{
    let metadata = ctx.metadata.clone();
    let chains = engine.parallel_map(finest, move |(id, payload)| {
        warp_tile(&metadata, id, &payload)
    });

    let mut fragments = Vec::new();
    for chain in chains {
        fragments.extend(chain?);
    }
    debug!(fragments = fragments.len(), "Warp stage complete");
    Ok(fragments)
}

/// Groups fragments by output tile and routes the groups to partitions.
pub fn group_stage<E, S>(
    engine: &E,
    ctx: &BuildContext<'_, S>,
    fragments: Vec<Fragment>,
) -> Result<Partitioned<(u8, TileId), Fragment>>
where
    E: ExecutionEngine,
    S: TileStore,
{
    let plan = ctx.plan.clone();
    engine.group_by_partition(fragments, Fragment::key, move |&(zoom, target)| {
        plan.partition_of(zoom, target)
    })
}

/// Stitches and writes every planned partition, empty ones included.
///
/// Every partition runs to completion or aborts on its own. The first error
/// in partition order is returned after all of them have finished.
pub fn write_stage<E, S>(
    engine: &E,
    ctx: &BuildContext<'_, S>,
    mut grouped: Partitioned<(u8, TileId), Fragment>,
) -> Result<Vec<PartitionSummary>>
where
    E: ExecutionEngine,
    S: TileStore,
{
    let work: Vec<(PartitionRange, PartitionGroups)> = ctx
        .plan
        .partitions()
        .map(|(_, range)| (*range, grouped.remove(&range.index).unwrap_or_default()))
        .collect();

    engine
        .parallel_map(work, |(range, groups)| write_partition(ctx, range, groups))
        .into_iter()
        .collect()
}

/// Writes one partition: stitch each group in ascending id order and append.
#[instrument(
    level = "debug",
    skip(ctx, groups),
    fields(zoom = range.zoom, partition = range.index, groups = groups.len())
)]
fn write_partition<S: TileStore>(
    ctx: &BuildContext<'_, S>,
    range: PartitionRange,
    groups: PartitionGroups,
) -> Result<PartitionSummary> {
    let mut sink = ctx.store.open_sink(range.zoom, range.index)?;
    match append_groups(ctx, &mut sink, &range, groups) {
        Ok(()) => sink.close(),
        Err(e) => {
            warn!(
                zoom = range.zoom,
                partition = range.index,
                error = %e,
                "Partition failed, discarding output"
            );
            if let Err(abort) = sink.abort() {
                warn!(error = %abort, "Failed to discard partition output");
            }
            Err(e)
        }
    }
}

fn append_groups<S: TileStore>(
    ctx: &BuildContext<'_, S>,
    sink: &mut S::Sink,
    range: &PartitionRange,
    groups: PartitionGroups,
) -> Result<()> {
    if ctx.coverage == CoveragePolicy::Complete {
        check_missing_groups(ctx, range, &groups)?;
    }
    let mut keys: Vec<(u8, TileId)> = groups.keys().copied().collect();
    keys.sort_unstable();
    for (zoom, target) in keys {
        let fragments = groups.get(&(zoom, target)).map(Vec::as_slice).unwrap_or(&[]);
        let tile = stitch(&ctx.metadata, zoom, target, fragments, ctx.coverage)?;
        sink.append(tile.id, &tile.payload)?;
    }
    Ok(())
}

/// Output tiles of the range that no finest tile contributed to must lie
/// outside the dataset's footprint.
fn check_missing_groups<S: TileStore>(
    ctx: &BuildContext<'_, S>,
    range: &PartitionRange,
    groups: &PartitionGroups,
) -> Result<()> {
    for id in range.start.value()..range.end {
        let target = TileId(id);
        if !groups.contains_key(&(range.zoom, target)) {
            check_unfilled(&ctx.metadata, target)?;
        }
    }
    Ok(())
}
