//! Tuning knobs consumed from the host application's settings layer.

use serde::{Deserialize, Serialize};

/// Default number of blocks in flight between the reader and the parser.
pub const DEFAULT_INDEX_READ_BUFFER_SIZE: u32 = 2;

/// Bounds on the prefetch depth. One block is the degenerate (fully
/// synchronous) pipeline; past a hundred or so the extra buffering only
/// costs memory.
pub const MIN_INDEX_READ_BUFFER_SIZE: u32 = 1;
pub const MAX_INDEX_READ_BUFFER_SIZE: u32 = 128;

/// Indexing configuration.
///
/// The host persists and edits this; the engine only reads it at the start
/// of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Blocks allowed in flight between the reader and the parser.
    pub index_read_buffer_size: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_read_buffer_size: DEFAULT_INDEX_READ_BUFFER_SIZE,
        }
    }
}

impl IndexConfig {
    /// Prefetch depth clamped to its documented range.
    #[inline]
    pub fn prefetch_buffer_size(&self) -> usize {
        self.index_read_buffer_size
            .clamp(MIN_INDEX_READ_BUFFER_SIZE, MAX_INDEX_READ_BUFFER_SIZE) as usize
    }
}
