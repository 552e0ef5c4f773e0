//! Contiguous slices of the fixed-point weight vector.

use serde::{Deserialize, Serialize};

/// One batch of weights together with its position in the full vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Index of `values[0]` within the full vector.
    pub start_offset: usize,

    /// Weights in their original order.
    pub values: Vec<i64>,
}

impl Chunk {
    pub fn new(start_offset: usize, values: Vec<i64>) -> Self {
        Self {
            start_offset,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One past the last index covered by this chunk.
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.values.len()
    }
}
