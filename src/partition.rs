// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Static project sharding across parallel workers.
//!
//! Parallelism happens outside of this process: the same invocation runs on
//! several machines, each told its own worker index. Every worker computes
//! its slice on its own from identical inputs, so the assignment must be a
//! pure function of registry order, the selection, and the worker count.
//!
//! Projects with a file-level test runner are kept on every worker. Their
//! files are balanced by the CI provider, which hands each worker its share
//! through the explicit file listing.

use crate::registry::{ProjectRegistry, ProjectSet};

use tracing::{info, instrument};

/// Position of this process among parallel workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSlot {
    index: usize,
    total: usize,
}

impl WorkerSlot {
    /// Construct new worker slot.
    ///
    /// # Errors
    ///
    /// - Return [`PartitionError::NoWorkers`] if total is zero.
    /// - Return [`PartitionError::IndexOutOfRange`] if index is not below
    ///   total.
    pub fn new(index: usize, total: usize) -> Result<Self> {
        if total == 0 {
            return Err(PartitionError::NoWorkers);
        }

        if index >= total {
            return Err(PartitionError::IndexOutOfRange { index, total });
        }

        Ok(Self { index, total })
    }

    /// Slot of a lone worker, i.e., no partitioning at all.
    pub fn single() -> Self {
        Self { index: 0, total: 1 }
    }

    /// Resolve slot from optional index and total.
    ///
    /// Missing values mean this is the only worker.
    ///
    /// # Errors
    ///
    /// - Return [`PartitionError`] if the pair is invalid.
    pub fn from_parts(index: Option<usize>, total: Option<usize>) -> Result<Self> {
        match (index, total) {
            (Some(index), Some(total)) => Self::new(index, total),
            (None, Some(total)) if total > 1 => Err(PartitionError::MissingIndex { total }),
            _ => Ok(Self::single()),
        }
    }

    /// More than one worker shares the run.
    pub fn is_parallel(&self) -> bool {
        self.total > 1
    }
}

impl Default for WorkerSlot {
    fn default() -> Self {
        Self::single()
    }
}

/// Shard selected projects across workers.
#[derive(Debug, Clone, Copy)]
pub struct PartitionFilter<'r> {
    registry: &'r ProjectRegistry,
}

impl<'r> PartitionFilter<'r> {
    /// Construct new partition filter over target registry.
    pub fn new(registry: &'r ProjectRegistry) -> Self {
        Self { registry }
    }

    /// Keep only the projects assigned to target worker.
    ///
    /// Projects without a file-level test runner are dealt round-robin in
    /// registry order. Output keeps the order of the input.
    #[instrument(skip(self, selected), level = "debug")]
    pub fn partition(&self, selected: &ProjectSet, slot: WorkerSlot) -> ProjectSet {
        if !slot.is_parallel() {
            return selected.clone();
        }

        info!(
            "parallelism detected, pruning projects not on node {}",
            slot.index
        );

        let mut keep = ProjectSet::new();
        let mut node = 0;
        for project in self.registry.iter() {
            if !selected.contains(&project.name) {
                continue;
            }

            if project.has_file_test_runner() {
                info!("[{}] contains file test runner, keeping", project.name);
                keep.insert(project.name.as_str());
                continue;
            }

            if node == slot.index {
                info!("[{}] running on node {node}, keeping", project.name);
                keep.insert(project.name.as_str());
            } else {
                info!("[{}] running on node {node}, removing", project.name);
            }
            node = (node + 1) % slot.total;
        }

        let result: ProjectSet = selected.iter().filter(|name| keep.contains(name)).collect();
        info!("running these projects on this node: {result}");

        result
    }
}

/// Worker slot error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    /// Worker total of zero.
    #[error("worker total must be at least one")]
    NoWorkers,

    /// Worker index not below total.
    #[error("worker index {index} out of range for {total} worker(s)")]
    IndexOutOfRange { index: usize, total: usize },

    /// Worker total given without an index.
    #[error("worker total {total} given without a worker index")]
    MissingIndex { total: usize },
}

/// Friendly result alias :3
pub type Result<T, E = PartitionError> = std::result::Result<T, E>;
