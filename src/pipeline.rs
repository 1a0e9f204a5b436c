//! Bounded reader → parser pipeline that drives one indexing pass.
//!
//! Shape:
//! - **Reader**: a dedicated thread reads fixed-size blocks sequentially
//!   from the file and stops at EOF, on a read error, or when the interrupt
//!   flag is raised.
//! - **Limiter**: a bounded channel of `prefetch_buffer_size` blocks. A full
//!   channel blocks the reader; that is the only backpressure mechanism, and
//!   it caps pipeline memory at depth × block size.
//! - **Parser**: runs serially on the calling thread, in the reader's
//!   emission order, so index commits and the incremental MD5 see bytes
//!   strictly in file order. Parallel parsing is not an option here: the
//!   rolling hash is order-dependent.
//!
//! Cancellation drains: the reader stops producing, the parser consumes
//! whatever is already in flight, and only then does the pass return. The
//! index never ends up with a half-committed block.

use std::fs::File;
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use tracing::{debug, info, trace, warn};

use crate::encoding::{detect_encoding, EncodingParameters};
use crate::indexing_data::IndexingData;
use crate::line_position::FastLinePositionArray;
use crate::scan::{parse_data_block, IndexingState};
use crate::{InterruptRequest, LineLength, LineOffset, INDEXING_BLOCK_SIZE};

/// One block handed from the reader to the parser.
struct BlockData {
    beginning: u64,
    bytes: Vec<u8>,
}

/// Runs one indexing pass over `file`, starting the read at `read_from`.
///
/// `state` arrives seeded by the operation (cursor position, known
/// encodings, file size) and leaves holding the final cursor. Progress
/// percentages are pushed through `progress`, consecutive duplicates
/// dropped.
pub(crate) fn index_file(
    mut file: File,
    read_from: u64,
    indexing_data: &IndexingData,
    state: &mut IndexingState,
    interrupt: &InterruptRequest,
    prefetch_buffer_size: usize,
    progress: &mut dyn FnMut(u8),
) {
    let indexing_start = Instant::now();
    let (block_tx, block_rx) = bounded::<BlockData>(prefetch_buffer_size);

    let io_duration = thread::scope(|scope| {
        let reader = scope.spawn(move || {
            let mut io_duration = Duration::ZERO;
            let mut offset = read_from;
            loop {
                if interrupt.is_set() {
                    debug!("reader interrupted at offset {offset}");
                    break;
                }

                let mut bytes = vec![0u8; INDEXING_BLOCK_SIZE];
                let io_start = Instant::now();
                let read = match file.read(&mut bytes) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(err) => {
                        warn!(%err, "read failed at offset {offset}, stopping the pass");
                        break;
                    }
                };
                io_duration += io_start.elapsed();

                bytes.truncate(read);
                trace!("sending block {offset} ({read} bytes)");
                if block_tx.send(BlockData { beginning: offset, bytes }).is_err() {
                    break;
                }
                offset += read as u64;
            }
            io_duration
        });

        let mut last_progress = None;
        for block in &block_rx {
            guess_encoding(&block.bytes, state, indexing_data);

            let line_positions = parse_data_block(block.beginning, &block.bytes, state);
            indexing_data.add_all(
                &block.bytes,
                state.max_length,
                &line_positions,
                state.encoding_guess,
            );

            let percent = if state.file_size > 0 {
                (state.pos.saturating_mul(100) / state.file_size).min(100) as u8
            } else {
                100
            };
            if last_progress != Some(percent) {
                progress(percent);
                last_progress = Some(percent);
            }
            trace!("block {} parsed, cursor at {}", block.beginning, state.pos);
        }

        reader.join().unwrap_or_default()
    });

    // Bytes past the last line feed become a synthetic final line so the
    // viewer can address them like any other.
    if !interrupt.is_set() && state.file_size > state.pos {
        warn!("file is not LF-terminated, adding a synthetic final line");

        let mut line_position = FastLinePositionArray::new();
        line_position.append(LineOffset(state.file_size + 1));
        line_position.set_fake_final_lf();

        indexing_data.add_all(&[], LineLength(0), &line_position, state.encoding_guess);
    }

    let duration = indexing_start.elapsed();
    let throughput = if duration.as_secs_f64() > 0.0 {
        state.file_size as f64 / duration.as_secs_f64() / (1024.0 * 1024.0)
    } else {
        0.0
    };
    info!(
        "indexing pass done in {:?} (io {:?}), {:.1} MiB/s",
        duration, io_duration, throughput
    );
}

/// Fills in the detector output on the first block seen and resolves the
/// effective codec once: forced > previously stored guess > fresh guess.
fn guess_encoding(block: &[u8], state: &mut IndexingState, indexing_data: &IndexingData) {
    if state.encoding_guess.is_none() {
        let guess = detect_encoding(block);
        info!(encoding = guess.name(), "encoding guess");
        state.encoding_guess = Some(guess);
    }

    if state.file_text_codec.is_none() {
        let codec = indexing_data
            .forced_encoding()
            .or_else(|| indexing_data.encoding_guess())
            .or(state.encoding_guess);

        if let Some(codec) = codec {
            state.encoding_params = EncodingParameters::new(codec);
            info!(
                encoding = codec.name(),
                line_feed_width = state.encoding_params.line_feed_width,
                "effective codec"
            );
            state.file_text_codec = Some(codec);
        }
    }
}
