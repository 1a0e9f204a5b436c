//! Line-terminator scanning with tab expansion folded into the same pass.
//!
//! One linear pass per block: `memchr` finds the next `0x0A`, the stretch
//! before it is swept for `0x09`, and each tab's contribution to the line's
//! display width is accumulated on the way. Widths therefore come for free
//! with the offsets (the horizontal scrollbar needs them), with no second
//! pass over the text.
//!
//! The scanner is byte-oriented for every supported encoding: the raw
//! search targets the `0x0A` byte and [`EncodingParameters`] translates a
//! match back to the start of its code unit, so one `memchr` path serves
//! UTF-8, the UTF-16s and the UTF-32s alike.

use memchr::memchr;

use crate::encoding::{EncodingParameters, TextEncoding};
use crate::line_position::FastLinePositionArray;
use crate::{LineLength, LineOffset, TAB_STOP};

/// Scan cursor carried across blocks within one indexing pass.
///
/// `pos` is the byte offset of the current line's start, which can lie in
/// an earlier block than the one being scanned; `additional_spaces` is the
/// tab-expansion carry for that line.
#[derive(Clone, Debug)]
pub struct IndexingState {
    /// Byte offset of the current line start.
    pub pos: u64,
    /// Byte offset of the last line feed found.
    pub end: u64,
    /// Extra display columns contributed by tabs on the current line.
    pub additional_spaces: i64,
    /// Maximum line width seen while scanning the current block.
    pub max_length: LineLength,
    /// Size of the file when the pass started.
    pub file_size: u64,
    /// Most recent detector output.
    pub encoding_guess: Option<TextEncoding>,
    /// Effective codec for the pass: forced > previous guess > fresh guess.
    pub file_text_codec: Option<TextEncoding>,
    /// Scan parameters derived from the effective codec.
    pub encoding_params: EncodingParameters,
}

impl IndexingState {
    pub fn new(file_size: u64) -> Self {
        Self {
            pos: 0,
            end: 0,
            additional_spaces: 0,
            max_length: LineLength(0),
            file_size,
            encoding_guess: None,
            file_text_codec: None,
            encoding_params: EncodingParameters::default(),
        }
    }
}

/// Scans one block for line terminators.
///
/// Returns the line-start offsets found in the block; updates the cursor,
/// the tab carry and the per-block `max_length` in `state`. A line spanning
/// several blocks keeps accumulating carry and is emitted on the block
/// holding its line feed. Empty blocks produce no positions.
pub fn parse_data_block(
    block_beginning: u64,
    block: &[u8],
    state: &mut IndexingState,
) -> FastLinePositionArray {
    state.max_length = LineLength(0);
    let mut line_positions = FastLinePositionArray::new();

    let before_cr = i64::from(state.encoding_params.before_cr_offset);
    let lf_width = u64::from(state.encoding_params.line_feed_width);

    // The current line may have started in an earlier block.
    let mut search_from = state.pos.saturating_sub(block_beginning) as usize;

    while search_from < block.len() {
        match memchr(b'\n', &block[search_from..block.len()]) {
            Some(found) => {
                let lf_pos = search_from + found;
                expand_tabs(block, search_from, lf_pos, block_beginning, before_cr, state);

                // First byte of the LF code unit; for big-endian wide
                // encodings it can sit in the previous block.
                let lf_start = block_beginning as i64 + lf_pos as i64 - before_cr;
                state.end = lf_start.max(0) as u64;

                let length =
                    state.end.saturating_sub(state.pos) as i64 + state.additional_spaces;
                if length > state.max_length.0 as i64 {
                    state.max_length = LineLength(length.max(0) as u64);
                }

                state.pos = state.end + lf_width;
                state.additional_spaces = 0;
                line_positions.append(LineOffset(state.pos));

                search_from = state.pos.saturating_sub(block_beginning) as usize;
            }
            None => {
                expand_tabs(block, search_from, block.len(), block_beginning, before_cr, state);
                break;
            }
        }
    }

    line_positions
}

/// Accumulates the tab-expansion carry over `block[from..to]`.
fn expand_tabs(
    block: &[u8],
    from: usize,
    to: usize,
    block_beginning: u64,
    before_cr: i64,
    state: &mut IndexingState,
) {
    let mut search = from;
    while search < to {
        match memchr(b'\t', &block[search..to]) {
            Some(found) => {
                let tab_start = block_beginning as i64 + (search + found) as i64 - before_cr;
                // Display column of the tab within its line: bytes since the
                // line start plus the expansion accumulated so far. Never
                // negative, even when the line started in an earlier block.
                let column = tab_start - state.pos as i64 + state.additional_spaces;
                debug_assert!(column >= 0, "tab before its own line start");
                state.additional_spaces += TAB_STOP as i64 - column % TAB_STOP as i64 - 1;
                search += found + 1;
            }
            None => break,
        }
    }
}
