//! Per-build context passed explicitly into every stage.

use crate::engine::Broadcast;
use crate::metadata::PyramidMetadata;
use crate::partition::PartitionPlan;
use crate::stitch::CoveragePolicy;
use crate::storage::TileStore;

/// Everything a stage needs to know about the build in progress.
///
/// Metadata and plan are broadcast handles, so cloning them into tasks is
/// cheap. The context is created once per build and never mutated.
pub struct BuildContext<'a, S> {
    pub metadata: Broadcast<PyramidMetadata>,
    pub plan: Broadcast<PartitionPlan>,
    pub coverage: CoveragePolicy,
    pub store: &'a S,
}

impl<'a, S: TileStore> BuildContext<'a, S> {
    pub fn new(
        metadata: Broadcast<PyramidMetadata>,
        plan: Broadcast<PartitionPlan>,
        coverage: CoveragePolicy,
        store: &'a S,
    ) -> Self {
        Self {
            metadata,
            plan,
            coverage,
            store,
        }
    }
}
