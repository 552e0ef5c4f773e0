//! Batch planning for weight vectors that exceed a single operation's budget.
//!
//! The remote environment caps the cost of every individual operation, so a
//! classifier is created with a head slice of its weights and the rest are
//! appended through incremental updates. This module only does the
//! partitioning arithmetic; submission lives in the provisioner.

use std::num::NonZeroUsize;

use crate::domain::{Chunk, FixedPointVector};

/// Splits a weight vector into a creation-sized head and update-sized tail chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlanner {
    initial_size: NonZeroUsize,
    update_size: NonZeroUsize,
}

impl BatchPlanner {
    /// Planner whose first chunk holds up to `initial_size` weights and every
    /// following chunk up to `update_size`.
    pub fn new(initial_size: NonZeroUsize, update_size: NonZeroUsize) -> Self {
        Self {
            initial_size,
            update_size,
        }
    }

    /// Planner that uses the same size for every chunk.
    pub fn uniform(chunk_size: NonZeroUsize) -> Self {
        Self::new(chunk_size, chunk_size)
    }

    pub fn initial_size(&self) -> usize {
        self.initial_size.get()
    }

    pub fn update_size(&self) -> usize {
        self.update_size.get()
    }

    /// Partition `values` into ordered, contiguous, non-overlapping chunks.
    ///
    /// An empty vector yields no chunks. Otherwise the first chunk starts at
    /// offset 0 and the concatenation of all chunks equals `values`.
    pub fn plan(&self, values: &FixedPointVector) -> Vec<Chunk> {
        let values = values.as_slice();
        if values.is_empty() {
            return Vec::new();
        }

        let head_len = self.initial_size.get().min(values.len());
        let (head, tail) = values.split_at(head_len);
        let update_size = self.update_size.get();

        let mut chunks = Vec::with_capacity(1 + tail.len().div_ceil(update_size));
        chunks.push(Chunk::new(0, head.to_vec()));
        chunks.extend(
            tail.chunks(update_size)
                .enumerate()
                .map(|(i, slice)| Chunk::new(head_len + i * update_size, slice.to_vec())),
        );
        chunks
    }

    /// Number of incremental update calls needed after creation for `len` weights.
    pub fn update_calls(&self, len: usize) -> usize {
        len.saturating_sub(self.initial_size.get())
            .div_ceil(self.update_size.get())
    }
}

/// Partition `values` into chunks of exactly `chunk_size`, except possibly the last.
pub fn plan(values: &FixedPointVector, chunk_size: NonZeroUsize) -> Vec<Chunk> {
    BatchPlanner::uniform(chunk_size).plan(values)
}
