//! Text-encoding detection and per-encoding scan parameters.
//!
//! The detector is a pure best-effort classifier over the first block of a
//! file: BOM sniff, then NUL-density statistics for the UTF-16/UTF-32
//! families, then strict UTF-8 validation, then the 8-bit locale fallback.
//! The scanner itself never decodes text; it byte-searches for `0x0A` and
//! uses [`EncodingParameters`] to translate a matched byte back to the start
//! of the line-feed code unit.

/// Text encodings the scanner knows how to walk.
///
/// The engine never transcodes; an encoding only determines the width of a
/// line-feed code unit and where the `0x0A` byte sits inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    /// 8-bit locale fallback.
    Iso8859_1,
}

impl TextEncoding {
    /// System/locale default used when detection finds nothing better.
    #[inline]
    pub const fn locale_default() -> Self {
        TextEncoding::Iso8859_1
    }

    pub const fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Utf16Be => "UTF-16BE",
            TextEncoding::Utf32Le => "UTF-32LE",
            TextEncoding::Utf32Be => "UTF-32BE",
            TextEncoding::Iso8859_1 => "ISO-8859-1",
        }
    }
}

/// Scan parameters derived from an encoding.
///
/// `line_feed_width` is the byte width of one code unit. `before_cr_offset`
/// is how far the `0x0A` byte sits past the first byte of its code unit, so
/// a raw byte match is translated back by subtracting it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodingParameters {
    pub line_feed_width: u8,
    pub before_cr_offset: u8,
}

impl Default for EncodingParameters {
    fn default() -> Self {
        Self {
            line_feed_width: 1,
            before_cr_offset: 0,
        }
    }
}

impl EncodingParameters {
    pub const fn new(encoding: TextEncoding) -> Self {
        match encoding {
            TextEncoding::Utf8 | TextEncoding::Iso8859_1 => Self {
                line_feed_width: 1,
                before_cr_offset: 0,
            },
            // LF is `0A 00`; the match already is the code-unit start.
            TextEncoding::Utf16Le => Self {
                line_feed_width: 2,
                before_cr_offset: 0,
            },
            // LF is `00 0A`; the match is one byte into the code unit.
            TextEncoding::Utf16Be => Self {
                line_feed_width: 2,
                before_cr_offset: 1,
            },
            TextEncoding::Utf32Le => Self {
                line_feed_width: 4,
                before_cr_offset: 0,
            },
            TextEncoding::Utf32Be => Self {
                line_feed_width: 4,
                before_cr_offset: 3,
            },
        }
    }
}

/// Heuristically identify the text encoding of an initial file block.
///
/// Deterministic and I/O-free; the same block always classifies the same
/// way. Misclassification on pathological input degrades line widths and
/// line-feed stepping, never memory safety, and a user override
/// (`force_encoding`) wins over whatever this returns.
pub fn detect_encoding(block: &[u8]) -> TextEncoding {
    if let Some(encoding) = sniff_bom(block) {
        return encoding;
    }

    if block.is_empty() {
        return TextEncoding::locale_default();
    }

    if let Some(encoding) = classify_nul_density(block) {
        return encoding;
    }

    match std::str::from_utf8(block) {
        Ok(_) => TextEncoding::Utf8,
        // A multi-byte sequence cut off by the block boundary is still UTF-8.
        Err(err) if err.error_len().is_none() => TextEncoding::Utf8,
        Err(_) => TextEncoding::locale_default(),
    }
}

/// UTF-32 LE must be tested before UTF-16 LE: its BOM starts with `FF FE`.
fn sniff_bom(block: &[u8]) -> Option<TextEncoding> {
    if block.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        Some(TextEncoding::Utf32Le)
    } else if block.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        Some(TextEncoding::Utf32Be)
    } else if block.starts_with(&[0xFF, 0xFE]) {
        Some(TextEncoding::Utf16Le)
    } else if block.starts_with(&[0xFE, 0xFF]) {
        Some(TextEncoding::Utf16Be)
    } else if block.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some(TextEncoding::Utf8)
    } else {
        None
    }
}

/// NUL-byte placement statistics for the wide-character families.
///
/// UTF-32 is tested first because ASCII-heavy UTF-32 also matches the
/// UTF-16 even/odd profile.
fn classify_nul_density(block: &[u8]) -> Option<TextEncoding> {
    if block.len() >= 8 {
        let lanes = block.len() / 4;
        let mut le_lanes = 0usize;
        let mut be_lanes = 0usize;
        for lane in block.chunks_exact(4) {
            if lane[2] == 0 && lane[3] == 0 && (lane[0] != 0 || lane[1] != 0) {
                le_lanes += 1;
            }
            if lane[0] == 0 && lane[1] == 0 && (lane[2] != 0 || lane[3] != 0) {
                be_lanes += 1;
            }
        }
        // BMP text zeroes the top half of every code unit; tolerate a few
        // supplementary-plane outliers.
        let threshold = lanes - lanes / 16;
        if le_lanes >= threshold {
            return Some(TextEncoding::Utf32Le);
        }
        if be_lanes >= threshold {
            return Some(TextEncoding::Utf32Be);
        }
    }

    if block.len() >= 4 {
        let pairs = block.len() / 2;
        let mut nul_even = 0usize;
        let mut nul_odd = 0usize;
        for (i, &byte) in block.iter().enumerate() {
            if byte == 0 {
                if i % 2 == 0 {
                    nul_even += 1;
                } else {
                    nul_odd += 1;
                }
            }
        }
        // Latin-script UTF-16 puts a NUL in the high byte of most code
        // units; the low bytes stay mostly non-NUL.
        if nul_odd * 2 >= pairs && nul_even * 8 <= pairs {
            return Some(TextEncoding::Utf16Le);
        }
        if nul_even * 2 >= pairs && nul_odd * 8 <= pairs {
            return Some(TextEncoding::Utf16Be);
        }
    }

    None
}
