//! Encoding detection and wide-character line feeds, end to end.

use std::path::PathBuf;
use std::sync::Arc;

use logindex::{
    FullIndexOperation, IndexConfig, IndexingData, InterruptRequest, LineNumber, TextEncoding,
};

fn fixture(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("encoded.log");
    std::fs::write(&path, contents).expect("write fixture");
    (dir, path)
}

fn full_index(path: &PathBuf, forced: Option<TextEncoding>) -> Arc<IndexingData> {
    let data = Arc::new(IndexingData::new());
    FullIndexOperation::new(
        path,
        Arc::clone(&data),
        Arc::new(InterruptRequest::new()),
        IndexConfig::default(),
        forced,
    )
    .run(&mut |_| {});
    data
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn utf16be(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
}

#[test]
fn bomless_utf16le_is_detected_and_walked() {
    // "hi\n" as `68 00 69 00 0A 00`.
    let (_dir, path) = fixture(&utf16le("hi\n"));
    let data = full_index(&path, None);

    assert_eq!(data.encoding_guess(), Some(TextEncoding::Utf16Le));
    assert_eq!(data.nb_lines().0, 1);
    assert_eq!(data.pos_for_line(LineNumber(0)).0, 6);
    assert!(!data.fake_final_lf());
}

#[test]
fn utf16be_line_feeds_step_correctly() {
    let (_dir, path) = fixture(&utf16be("one\ntwo\n"));
    let data = full_index(&path, None);

    assert_eq!(data.encoding_guess(), Some(TextEncoding::Utf16Be));
    assert_eq!(data.nb_lines().0, 2);
    // "one\n" is four code units: the second line starts at byte 8.
    assert_eq!(data.pos_for_line(LineNumber(0)).0, 8);
    assert_eq!(data.pos_for_line(LineNumber(1)).0, 16);
}

#[test]
fn utf8_bom_is_recognized() {
    let mut contents = vec![0xEF, 0xBB, 0xBF];
    contents.extend_from_slice(b"first\nsecond\n");
    let (_dir, path) = fixture(&contents);
    let data = full_index(&path, None);

    assert_eq!(data.encoding_guess(), Some(TextEncoding::Utf8));
    assert_eq!(data.nb_lines().0, 2);
}

#[test]
fn utf16le_bom_is_recognized() {
    let mut contents = vec![0xFF, 0xFE];
    contents.extend_from_slice(&utf16le("log\n"));
    let (_dir, path) = fixture(&contents);
    let data = full_index(&path, None);

    assert_eq!(data.encoding_guess(), Some(TextEncoding::Utf16Le));
    assert_eq!(data.nb_lines().0, 1);
    assert_eq!(data.pos_for_line(LineNumber(0)).0, 10);
}

#[test]
fn forced_encoding_overrides_the_guess() {
    // UTF-16 LE on disk, but the user pins an 8-bit codec: line feeds are
    // found byte-wise and the trailing NUL half makes the file look
    // unterminated.
    let (_dir, path) = fixture(&utf16le("hi\n"));
    let data = full_index(&path, Some(TextEncoding::Iso8859_1));

    assert_eq!(data.forced_encoding(), Some(TextEncoding::Iso8859_1));
    assert_eq!(data.encoding_guess(), Some(TextEncoding::Utf16Le));
    assert_eq!(data.nb_lines().0, 2);
    assert!(data.fake_final_lf());
}

#[test]
fn locale_fallback_for_eight_bit_data() {
    let (_dir, path) = fixture(&[b'c', 0xE9, b'v', b'e', b'n', b'n', b'e', b'\n']);
    let data = full_index(&path, None);

    assert_eq!(data.encoding_guess(), Some(TextEncoding::Iso8859_1));
    assert_eq!(data.nb_lines().0, 1);
    assert_eq!(data.max_length().0, 7);
}

#[test]
fn guess_survives_a_partial_pass() {
    let (_dir, path) = fixture(&utf16le("first\n"));
    let data = full_index(&path, None);
    assert_eq!(data.encoding_guess(), Some(TextEncoding::Utf16Le));

    use std::io::Write;
    std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .expect("reopen")
        .write_all(&utf16le("second\n"))
        .expect("append");

    logindex::PartialIndexOperation::new(
        &path,
        Arc::clone(&data),
        Arc::new(InterruptRequest::new()),
        IndexConfig::default(),
    )
    .run(&mut |_| {});

    assert_eq!(data.encoding_guess(), Some(TextEncoding::Utf16Le));
    assert_eq!(data.nb_lines().0, 2);
    assert_eq!(data.pos_for_line(LineNumber(0)).0, 12);
    assert_eq!(data.pos_for_line(LineNumber(1)).0, 26);
}
