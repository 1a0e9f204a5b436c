//! Shared index state with strict concurrent-read / exclusive-write
//! discipline.
//!
//! `IndexingData` is shared between the background worker (the sole writer
//! while a pass is active) and any number of readers in the viewing layer.
//! Every accessor serializes on one internal mutex, and the API is shaped so
//! that size, line positions and the content hash advance atomically per
//! scanned block: `add_all` is the only way to grow the index, and it takes
//! everything a block produced in one call. No lock guard ever escapes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::encoding::TextEncoding;
use crate::line_position::{FastLinePositionArray, LinePositionArray};
use crate::{LineLength, LineNumber, LineOffset, LinesCount, INDEXED_HASH_LEN};

/// Content fingerprint covering the prefix of the file the index describes.
///
/// Invariant: `digest` is the MD5 of the first `size` bytes of the file as
/// they were at indexing time. Used solely for change detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexedHash {
    pub digest: [u8; INDEXED_HASH_LEN],
    pub size: u64,
}

impl Default for IndexedHash {
    fn default() -> Self {
        Self {
            // Digest of the empty prefix, so a never-indexed file compares
            // consistently in the change check.
            digest: md5::Context::new().compute().0,
            size: 0,
        }
    }
}

#[derive(Clone)]
struct IndexingDataInner {
    line_position: LinePositionArray,
    max_length: LineLength,
    hash_context: md5::Context,
    hash: IndexedHash,
    encoding_guess: Option<TextEncoding>,
    encoding_forced: Option<TextEncoding>,
}

impl Default for IndexingDataInner {
    fn default() -> Self {
        Self {
            line_position: LinePositionArray::new(),
            max_length: LineLength(0),
            hash_context: md5::Context::new(),
            hash: IndexedHash::default(),
            encoding_guess: None,
            encoding_forced: None,
        }
    }
}

/// The shared, mutable line index of one document.
///
/// Constructed empty, cleared at the start of a full pass, appended to by
/// partial passes, readable at any time.
#[derive(Default)]
pub struct IndexingData {
    inner: Mutex<IndexingDataInner>,
}

impl IndexingData {
    pub fn new() -> Self {
        Self::default()
    }

    // The index tolerates a poisoned mutex: writes are atomic per block, so
    // the committed state is consistent even if a writer thread panicked.
    fn lock(&self) -> MutexGuard<'_, IndexingDataInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of file bytes the index describes.
    pub fn size(&self) -> u64 {
        self.lock().hash.size
    }

    pub fn hash(&self) -> IndexedHash {
        self.lock().hash
    }

    /// Maximum display width observed over all indexed lines.
    pub fn max_length(&self) -> LineLength {
        self.lock().max_length
    }

    pub fn nb_lines(&self) -> LinesCount {
        LinesCount(self.lock().line_position.len() as u64)
    }

    /// Offset of the first byte of line `line + 1`.
    ///
    /// # Panics
    /// Panics if `line` is out of range.
    pub fn pos_for_line(&self, line: LineNumber) -> LineOffset {
        self.lock().line_position.at(line)
    }

    /// Whether the last entry is the synthetic end-of-file sentinel.
    pub fn fake_final_lf(&self) -> bool {
        self.lock().line_position.fake_final_lf()
    }

    pub fn encoding_guess(&self) -> Option<TextEncoding> {
        self.lock().encoding_guess
    }

    pub fn set_encoding_guess(&self, encoding: TextEncoding) {
        self.lock().encoding_guess = Some(encoding);
    }

    /// User override; wins over the heuristic guess when scanning.
    pub fn force_encoding(&self, encoding: Option<TextEncoding>) {
        self.lock().encoding_forced = encoding;
    }

    pub fn forced_encoding(&self) -> Option<TextEncoding> {
        self.lock().encoding_forced
    }

    /// Commits one scanned block: line positions, the block's maximum line
    /// width, the block's bytes into the rolling hash, and the current
    /// encoding guess — atomically with respect to every reader.
    pub fn add_all(
        &self,
        block: &[u8],
        max_length: LineLength,
        line_position: &FastLinePositionArray,
        encoding_guess: Option<TextEncoding>,
    ) {
        let mut data = self.lock();

        data.max_length = data.max_length.max(max_length);
        data.line_position.append_list(line_position);

        data.hash_context.consume(block);
        data.hash.digest = data.hash_context.clone().compute().0;
        data.hash.size += block.len() as u64;

        data.encoding_guess = encoding_guess;
    }

    /// Resets the index to its freshly-constructed state.
    pub fn clear(&self) {
        *self.lock() = IndexingDataInner::default();
    }
}
