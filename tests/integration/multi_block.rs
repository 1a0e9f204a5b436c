//! Files larger than one pipeline block: boundary-spanning lines, tab
//! carry across blocks, and index consistency against a naive oracle.

use std::path::PathBuf;
use std::sync::Arc;

use logindex::{
    FullIndexOperation, IndexConfig, IndexingData, InterruptRequest, LineNumber, OperationResult,
    TAB_STOP,
};

fn fixture(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("big.log");
    std::fs::write(&path, contents).expect("write fixture");
    (dir, path)
}

fn full_index(path: &PathBuf) -> Arc<IndexingData> {
    let data = Arc::new(IndexingData::new());
    let result = FullIndexOperation::new(
        path,
        Arc::clone(&data),
        Arc::new(InterruptRequest::new()),
        IndexConfig::default(),
        None,
    )
    .run(&mut |_| {});
    assert_eq!(result, OperationResult::Completion(true));
    data
}

/// Naive single-pass reference: line-start offsets and the maximum
/// tab-expanded width.
fn oracle(contents: &[u8]) -> (Vec<u64>, u64) {
    let mut positions = Vec::new();
    let mut max_width = 0u64;
    let mut column = 0u64;
    for (i, &byte) in contents.iter().enumerate() {
        match byte {
            b'\n' => {
                positions.push(i as u64 + 1);
                max_width = max_width.max(column);
                column = 0;
            }
            b'\t' => column += TAB_STOP - column % TAB_STOP,
            _ => column += 1,
        }
    }
    if contents.last().is_some_and(|&b| b != b'\n') {
        positions.push(contents.len() as u64 + 1);
    }
    (positions, max_width)
}

/// Mixed content, a bit over three pipeline blocks.
fn build_contents() -> Vec<u8> {
    let mut contents = Vec::with_capacity(3 * 1024 * 1024 + 64);
    let mut i = 0usize;
    // One very long line early on, guaranteed to straddle a block boundary,
    // with tabs sprinkled through it.
    contents.extend_from_slice(b"start-of-long-line\t");
    while contents.len() < 1_400_000 {
        contents.extend_from_slice(b"0123456789abcdef\t");
    }
    contents.push(b'\n');
    // Then plenty of short lines of varying width.
    while contents.len() < 3 * 1024 * 1024 {
        let line = format!("{i:07} level=info\tmsg=\"payload {}\"\n", "x".repeat(i % 93));
        contents.extend_from_slice(line.as_bytes());
        i += 1;
    }
    contents
}

#[test]
fn matches_the_oracle_across_blocks() {
    let contents = build_contents();
    let (_dir, path) = fixture(&contents);
    let data = full_index(&path);

    let (positions, max_width) = oracle(&contents);

    assert_eq!(data.nb_lines().0, positions.len() as u64);
    assert_eq!(data.size(), contents.len() as u64);
    assert_eq!(data.max_length().0, max_width);
    assert_eq!(data.hash().digest, md5::compute(&contents).0);

    // Spot-check offsets: ends, plus a spread through the middle.
    let lines = positions.len() as u64;
    for line in [0, 1, lines / 3, lines / 2, lines - 2, lines - 1] {
        assert_eq!(
            data.pos_for_line(LineNumber(line)).0,
            positions[line as usize],
            "line {line}"
        );
    }
}

#[test]
fn unterminated_tail_after_blocks() {
    let mut contents = build_contents();
    contents.extend_from_slice(b"tail without a newline");
    let (_dir, path) = fixture(&contents);
    let data = full_index(&path);

    let (positions, _) = oracle(&contents);
    assert_eq!(data.nb_lines().0, positions.len() as u64);
    assert!(data.fake_final_lf());
    assert_eq!(
        data.pos_for_line(LineNumber(positions.len() as u64 - 1)).0,
        contents.len() as u64 + 1
    );
}

#[test]
fn single_block_pipeline_depth_still_works() {
    let contents = build_contents();
    let (_dir, path) = fixture(&contents);

    let data = Arc::new(IndexingData::new());
    let result = FullIndexOperation::new(
        &path,
        Arc::clone(&data),
        Arc::new(InterruptRequest::new()),
        IndexConfig {
            index_read_buffer_size: 1,
        },
        None,
    )
    .run(&mut |_| {});

    assert_eq!(result, OperationResult::Completion(true));
    let (positions, max_width) = oracle(&contents);
    assert_eq!(data.nb_lines().0, positions.len() as u64);
    assert_eq!(data.max_length().0, max_width);
}
