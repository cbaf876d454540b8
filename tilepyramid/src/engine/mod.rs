//! Execution engine abstraction.
//!
//! The pipeline only needs three primitives from whatever runs it: a
//! parallel map, a keyed grouping that routes each group to a partition, and
//! a way to share read-only values with every task. [`LocalEngine`] provides
//! them on a rayon thread pool inside one process.

mod local;

pub use local::LocalEngine;

use crate::error::Result;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

/// Items grouped by key, and the groups by partition index.
pub type Partitioned<K, T> = BTreeMap<usize, HashMap<K, Vec<T>>>;

// =============================================================================
// Broadcast
// =============================================================================

/// Shared read-only handle to a value every task can see.
#[derive(Debug)]
pub struct Broadcast<V>(Arc<V>);

impl<V> Broadcast<V> {
    pub fn new(value: V) -> Self {
        Self(Arc::new(value))
    }

    pub fn value(&self) -> &V {
        &self.0
    }
}

impl<V> Clone for Broadcast<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V> Deref for Broadcast<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.0
    }
}

// =============================================================================
// ExecutionEngine
// =============================================================================

/// Runs the data-parallel stages of a build.
///
/// Implementations decide where work runs. Results must not depend on that:
/// `parallel_map` keeps input order and `group_by_partition` keeps the input
/// order of items within a group.
pub trait ExecutionEngine: Send + Sync {
    /// Applies `f` to every item, in parallel, returning results in input order.
    fn parallel_map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync;

    /// Groups items by `key_fn` and assigns every group to the partition
    /// returned by `partition_fn`.
    ///
    /// Fails with the first error `partition_fn` reports.
    fn group_by_partition<T, K, KF, PF>(
        &self,
        items: Vec<T>,
        key_fn: KF,
        partition_fn: PF,
    ) -> Result<Partitioned<K, T>>
    where
        T: Send,
        K: Eq + Hash + Send,
        KF: Fn(&T) -> K + Send + Sync,
        PF: Fn(&K) -> Result<usize> + Send + Sync;

    /// Makes `value` available to every task.
    fn broadcast<V: Send + Sync>(&self, value: V) -> Broadcast<V> {
        Broadcast::new(value)
    }
}
