//! The three indexing jobs: full index, partial index, change check.
//!
//! Each operation owns everything it needs for one run — the target path, a
//! handle on the shared index, the interrupt flag, configuration — and
//! resolves to an [`OperationResult`]. Failures never escape as errors:
//! an unreadable file is treated as empty by the indexing operations and as
//! a broken file identity by the change check, per the monitoring contract.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::encoding::{EncodingParameters, TextEncoding};
use crate::indexing_data::IndexingData;
use crate::pipeline::index_file;
use crate::scan::IndexingState;
use crate::{InterruptRequest, LineNumber, INDEXING_BLOCK_SIZE, TAB_STOP};

/// Verdict of a change check on the monitored file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitoredFileStatus {
    /// On-disk bytes match the indexed prefix exactly, nothing after it.
    Unchanged,
    /// The indexed prefix is intact and new bytes follow it.
    DataAdded,
    /// File identity broke: shrunk, rewritten, or unreadable. A full
    /// re-index is required.
    Truncated,
}

/// What an operation resolved to.
///
/// Indexing operations complete with a flag (`true` = ran to the end,
/// `false` = interrupted); the change check completes with a file status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Completion(bool),
    FileStatus(MonitoredFileStatus),
}

/// Everything one operation run needs.
struct OperationContext {
    path: PathBuf,
    indexing_data: Arc<IndexingData>,
    interrupt: Arc<InterruptRequest>,
    config: IndexConfig,
}

impl OperationContext {
    /// Core of the indexing operations: open, seed the scan state, run the
    /// pipeline.
    ///
    /// `read_from` is where the byte stream (and the rolling hash) resumes;
    /// `scan_from` is where the current line starts, which for a partial
    /// pass over an unterminated tail lies before `read_from`; `tab_carry`
    /// is the expansion already accumulated on that line.
    fn do_index(
        &self,
        read_from: u64,
        scan_from: u64,
        tab_carry: i64,
        progress: &mut dyn FnMut(u8),
    ) {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) => {
                // An unopenable file is treated as an empty one: the viewer
                // keeps running while the file is rotated away.
                warn!(path = %self.path.display(), %err, "cannot open file, clearing the index");
                self.indexing_data.clear();
                self.indexing_data
                    .set_encoding_guess(TextEncoding::locale_default());
                progress(100);
                return;
            }
        };

        let file_size = file.metadata().map(|meta| meta.len()).unwrap_or(0);

        let mut state = IndexingState::new(file_size);
        state.pos = scan_from;
        state.additional_spaces = tab_carry;
        state.encoding_guess = self.indexing_data.encoding_guess();
        state.file_text_codec = self
            .indexing_data
            .forced_encoding()
            .or_else(|| self.indexing_data.encoding_guess());
        if let Some(codec) = state.file_text_codec {
            state.encoding_params = EncodingParameters::new(codec);
        }

        if let Err(err) = file.seek(SeekFrom::Start(read_from)) {
            warn!(%err, "seek to {read_from} failed, clearing the index");
            self.indexing_data.clear();
            self.indexing_data
                .set_encoding_guess(TextEncoding::locale_default());
            progress(100);
            return;
        }

        index_file(
            file,
            read_from,
            &self.indexing_data,
            &mut state,
            &self.interrupt,
            self.config.prefetch_buffer_size(),
            progress,
        );

        if self.indexing_data.encoding_guess().is_none() {
            self.indexing_data
                .set_encoding_guess(TextEncoding::locale_default());
        }
    }
}

/// Clears the index and rebuilds it from the first byte.
pub struct FullIndexOperation {
    ctx: OperationContext,
    forced_encoding: Option<TextEncoding>,
}

impl FullIndexOperation {
    pub fn new(
        path: impl Into<PathBuf>,
        indexing_data: Arc<IndexingData>,
        interrupt: Arc<InterruptRequest>,
        config: IndexConfig,
        forced_encoding: Option<TextEncoding>,
    ) -> Self {
        Self {
            ctx: OperationContext {
                path: path.into(),
                indexing_data,
                interrupt,
                config,
            },
            forced_encoding,
        }
    }

    pub fn run(&self, progress: &mut dyn FnMut(u8)) -> OperationResult {
        debug!(path = %self.ctx.path.display(), "full index starting");
        progress(0);

        self.ctx.indexing_data.clear();
        self.ctx.indexing_data.force_encoding(self.forced_encoding);

        self.ctx.do_index(0, 0, 0, progress);

        debug!(
            interrupted = self.ctx.interrupt.is_set(),
            "full index finished"
        );
        OperationResult::Completion(!self.ctx.interrupt.is_set())
    }
}

/// Indexes the bytes appended since the previous pass.
///
/// Contract: the on-disk prefix covered by the index is unchanged; callers
/// establish that with [`CheckFileChangesOperation`] first.
pub struct PartialIndexOperation {
    ctx: OperationContext,
}

impl PartialIndexOperation {
    pub fn new(
        path: impl Into<PathBuf>,
        indexing_data: Arc<IndexingData>,
        interrupt: Arc<InterruptRequest>,
        config: IndexConfig,
    ) -> Self {
        Self {
            ctx: OperationContext {
                path: path.into(),
                indexing_data,
                interrupt,
                config,
            },
        }
    }

    pub fn run(&self, progress: &mut dyn FnMut(u8)) -> OperationResult {
        let initial_position = self.ctx.indexing_data.size();
        debug!(
            path = %self.ctx.path.display(),
            from = initial_position,
            "partial index starting"
        );
        progress(0);

        // If the indexed file ended mid-line, the appended bytes continue
        // that line: resume the scan at its true start, with the tab
        // expansion its indexed part already earned, so the widths come out
        // identical to a full pass. The byte stream (and the hash) still
        // resumes at `initial_position`.
        let (scan_from, tab_carry) = self.unterminated_line_seed(initial_position);

        self.ctx
            .do_index(initial_position, scan_from, tab_carry, progress);

        debug!("partial index finished");
        OperationResult::Completion(!self.ctx.interrupt.is_set())
    }

    /// Start offset and tab carry of the unterminated final line, if any.
    fn unterminated_line_seed(&self, initial_position: u64) -> (u64, i64) {
        let data = &self.ctx.indexing_data;
        if !data.fake_final_lf() {
            return (initial_position, 0);
        }

        let nb_lines = data.nb_lines().0;
        let line_start = if nb_lines >= 2 {
            data.pos_for_line(LineNumber(nb_lines - 2)).0
        } else {
            0
        };

        match self.rescan_tab_carry(line_start, initial_position) {
            Ok(carry) => (line_start, carry),
            Err(err) => {
                // Fall back to measuring from the old end of file; only the
                // continued line's width can come out short.
                warn!(%err, "tail rescan failed, resuming at the indexed size");
                (initial_position, 0)
            }
        }
    }

    /// Re-reads `[line_start, end)` (without hashing) to recover the tab
    /// carry of the line being continued.
    fn rescan_tab_carry(&self, line_start: u64, end: u64) -> std::io::Result<i64> {
        let params = self
            .ctx
            .indexing_data
            .forced_encoding()
            .or_else(|| self.ctx.indexing_data.encoding_guess())
            .map(EncodingParameters::new)
            .unwrap_or_default();
        let before_cr = i64::from(params.before_cr_offset);

        let mut file = File::open(&self.ctx.path)?;
        file.seek(SeekFrom::Start(line_start))?;

        let mut carry = 0i64;
        let mut offset = line_start;
        let mut buffer = vec![0u8; INDEXING_BLOCK_SIZE];
        while offset < end {
            let want = ((end - offset) as usize).min(buffer.len());
            let read = file.read(&mut buffer[..want])?;
            if read == 0 {
                break;
            }
            for found in memchr::memchr_iter(b'\t', &buffer[..read]) {
                let tab_start = offset as i64 + found as i64 - before_cr;
                let column = tab_start - line_start as i64 + carry;
                carry += TAB_STOP as i64 - column % TAB_STOP as i64 - 1;
            }
            offset += read as u64;
        }
        Ok(carry)
    }
}

/// Compares the on-disk file against the indexed prefix.
pub struct CheckFileChangesOperation {
    ctx: OperationContext,
}

impl CheckFileChangesOperation {
    pub fn new(
        path: impl Into<PathBuf>,
        indexing_data: Arc<IndexingData>,
        interrupt: Arc<InterruptRequest>,
        config: IndexConfig,
    ) -> Self {
        Self {
            ctx: OperationContext {
                path: path.into(),
                indexing_data,
                interrupt,
                config,
            },
        }
    }

    pub fn run(&self) -> OperationResult {
        debug!(path = %self.ctx.path.display(), "file change check starting");
        OperationResult::FileStatus(self.check())
    }

    fn check(&self) -> MonitoredFileStatus {
        let indexed_hash = self.ctx.indexing_data.hash();
        let real_size = std::fs::metadata(&self.ctx.path)
            .map(|meta| meta.len())
            .unwrap_or(0);

        if real_size == 0 || real_size < indexed_hash.size {
            info!(real_size, indexed = indexed_hash.size, "file truncated");
            return MonitoredFileStatus::Truncated;
        }

        let mut file = match File::open(&self.ctx.path) {
            Ok(file) => file,
            Err(err) => {
                info!(%err, "file failed to open, treating as truncated");
                return MonitoredFileStatus::Truncated;
            }
        };

        // Re-hash exactly the indexed prefix with buffered reads.
        let mut context = md5::Context::new();
        let mut buffer = vec![0u8; INDEXING_BLOCK_SIZE];
        let mut total = 0u64;
        while total < indexed_hash.size {
            let want = ((indexed_hash.size - total) as usize).min(buffer.len());
            let read = match file.read(&mut buffer[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    info!(%err, "re-hash read failed, treating as truncated");
                    return MonitoredFileStatus::Truncated;
                }
            };
            context.consume(&buffer[..read]);
            total += read as u64;
        }

        if total < indexed_hash.size {
            info!(total, indexed = indexed_hash.size, "short read, treating as truncated");
            return MonitoredFileStatus::Truncated;
        }

        let real_digest = context.compute().0;
        debug!(
            indexed = ?indexed_hash.digest,
            real = ?real_digest,
            "comparing content fingerprints"
        );

        if real_digest != indexed_hash.digest {
            info!("file changed in the indexed range");
            MonitoredFileStatus::Truncated
        } else if real_size > indexed_hash.size {
            info!(added = real_size - indexed_hash.size, "new data on disk");
            MonitoredFileStatus::DataAdded
        } else {
            info!("no change");
            MonitoredFileStatus::Unchanged
        }
    }
}
