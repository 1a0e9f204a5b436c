//! Indexing and change-detection core for a large-file log viewer.
//!
//! The engine turns an arbitrarily large, possibly growing, possibly
//! re-encoded text file into a compact, mutable index of line-start byte
//! offsets, plus a protocol for detecting on-disk mutation. It is built to
//! ingest gigabyte-scale logs at disk speed, re-index appended tails without
//! touching the already-indexed prefix, tell appends apart from truncations
//! and rewrites, and abandon a pass cooperatively at any chunk boundary.
//!
//! High-level flow (one indexing pass):
//! 1) A reader thread streams fixed-size blocks from the file.
//! 2) A bounded channel caps the blocks in flight (the prefetch limiter).
//! 3) A serial parser detects the encoding on the first block, scans each
//!    block for line feeds while folding tab expansion into the same pass,
//!    and commits `(block, widths, positions)` to the shared index under a
//!    single lock acquisition per block.
//!
//! Parsing is serial on purpose: the index keeps an incremental MD5 of every
//! byte it has consumed, and incremental hashing is order-dependent.
//!
//! Module map:
//! - `encoding`: encoding detection and per-encoding scan parameters.
//! - `line_position`: chunked storage of line-start offsets.
//! - `indexing_data`: the shared index state behind its lock.
//! - `scan`: the block scanner and its per-pass carry state.
//! - `pipeline`: the bounded reader/parser pipeline.
//! - `operations`: full index, partial index, change check.
//! - `worker`: the one-operation-at-a-time background scheduler.

pub mod config;
pub mod encoding;
pub mod indexing_data;
pub mod line_position;
pub mod operations;
pub mod pipeline;
pub mod scan;
pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};

pub use config::IndexConfig;
pub use encoding::{detect_encoding, EncodingParameters, TextEncoding};
pub use indexing_data::{IndexedHash, IndexingData};
pub use line_position::{FastLinePositionArray, LinePositionArray};
pub use operations::{
    CheckFileChangesOperation, FullIndexOperation, MonitoredFileStatus, OperationResult,
    PartialIndexOperation,
};
pub use worker::{LoadingStatus, Worker, WorkerEvent};

/// Display-column alignment unit for tab expansion.
pub const TAB_STOP: u64 = 8;

/// Bytes read from the file per pipeline block.
pub const INDEXING_BLOCK_SIZE: usize = 1024 * 1024;

/// Length in bytes of the MD5 content fingerprint.
pub const INDEXED_HASH_LEN: usize = 16;

/// Byte offset into the indexed file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineOffset(pub u64);

/// Zero-based index into the line-position array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineNumber(pub u64);

/// Number of indexed lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinesCount(pub u64);

impl LinesCount {
    #[inline]
    pub fn saturating_add(self, n: u64) -> Self {
        Self(self.0.saturating_add(n))
    }

    #[inline]
    pub fn saturating_sub(self, n: u64) -> Self {
        Self(self.0.saturating_sub(n))
    }
}

/// Display width of a line, tabs expanded to [`TAB_STOP`] columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineLength(pub u64);

impl LineLength {
    #[inline]
    pub fn saturating_add(self, n: u64) -> Self {
        Self(self.0.saturating_add(n))
    }
}

/// Cooperative cancellation flag shared between a job requester and the
/// worker running the job.
///
/// Level-triggered: `set` latches the request and the flag stays up until
/// the worker clears it before launching the next job. Safe to set from any
/// thread at any time; the running pass observes it at the next block
/// boundary and drains in-flight blocks before returning.
#[derive(Debug, Default)]
pub struct InterruptRequest {
    flag: AtomicBool,
}

impl InterruptRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cooperative abort of the in-flight operation, if any.
    #[inline]
    pub fn set(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
