//! In-process engine backed by a dedicated rayon thread pool.

use super::{ExecutionEngine, Partitioned};
use crate::error::{PyramidError, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::hash::Hash;
use std::io;
use tracing::debug;

/// Runs every stage on its own rayon pool, so builds never contend with the
/// global pool.
pub struct LocalEngine {
    pool: ThreadPool,
}

impl LocalEngine {
    /// Creates an engine with `threads` workers. Zero uses one worker per
    /// available core.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tilepyramid-{}", i))
            .build()
            .map_err(io::Error::other)?;
        debug!(threads = pool.current_num_threads(), "Local engine started");
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl std::fmt::Debug for LocalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEngine")
            .field("threads", &self.threads())
            .finish()
    }
}

impl ExecutionEngine for LocalEngine {
    fn parallel_map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        self.pool.install(|| items.into_par_iter().map(f).collect())
    }

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
        PF: Fn(&K) -> Result<usize> + Send + Sync,
    {
        let routed = self.pool.install(|| {
            items
                .into_par_iter()
                .map(|item| {
                    let key = key_fn(&item);
                    let partition = partition_fn(&key)?;
                    Ok::<_, PyramidError>((partition, key, item))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut grouped: Partitioned<K, T> = BTreeMap::new();
        for (partition, key, item) in routed {
            grouped
                .entry(partition)
                .or_default()
                .entry(key)
                .or_default()
                .push(item);
        }
        Ok(grouped)
    }
}
