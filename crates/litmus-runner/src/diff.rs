//! Token-level diff between expected and actual stream text.
//!
//! Longest-common-subsequence over word/character tokens, followed by a
//! semantic cleanup pass that folds small unchanged islands back into the
//! surrounding edits. Rendering highlights deletions on the expected side and
//! insertions on the actual side, substituting Unicode Control Pictures for
//! invisible characters inside changed spans only.

use std::collections::BTreeSet;

const COLOR_RESET: &str = "\x1b[0m";
const STYLE_DELETE: &str = "\x1b[31;7;9m";
const STYLE_INSERT: &str = "\x1b[32;7m";

// Beyond this many LCS cells the quadratic table is not worth it; the diff
// degrades to one whole-text delete/insert pair.
const MAX_LCS_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Equal(String),
    Delete(String),
    Insert(String),
}

/// Both sides of a rendered mismatch, plus the control-picture legend when
/// any invisible characters were substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiff {
    pub expected: String,
    pub actual: String,
    pub legend: Option<String>,
}

/// Render the expected/actual pair for a mismatch note.
///
/// Without color support the raw strings are passed through untouched; the
/// highlighting and glyph substitution only make sense on a capable terminal.
#[must_use]
pub fn render(expected: &str, actual: &str, use_color: bool) -> RenderedDiff {
    if !use_color {
        return RenderedDiff {
            expected: expected.to_string(),
            actual: actual.to_string(),
            legend: None,
        };
    }

    let chunks = semantic_cleanup(diff(expected, actual));
    let mut used = BTreeSet::new();
    let mut shown_expected = String::new();
    let mut shown_actual = String::new();

    for chunk in &chunks {
        match chunk {
            Chunk::Equal(text) => {
                shown_expected.push_str(text);
                shown_actual.push_str(text);
            }
            Chunk::Delete(text) => {
                let visible = with_visible_characters(text, &mut used);
                shown_expected.push_str(STYLE_DELETE);
                shown_expected.push_str(&visible);
                shown_expected.push_str(COLOR_RESET);
            }
            Chunk::Insert(text) => {
                let visible = with_visible_characters(text, &mut used);
                shown_actual.push_str(STYLE_INSERT);
                shown_actual.push_str(&visible);
                shown_actual.push_str(COLOR_RESET);
            }
        }
    }

    let legend = if used.is_empty() {
        None
    } else {
        Some(
            used.iter()
                .map(|ch| legend_line(*ch))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    };

    RenderedDiff {
        expected: shown_expected,
        actual: shown_actual,
        legend,
    }
}

/// Compute the raw chunk sequence between two texts.
#[must_use]
pub fn diff(expected: &str, actual: &str) -> Vec<Chunk> {
    if expected == actual {
        if expected.is_empty() {
            return Vec::new();
        }
        return vec![Chunk::Equal(expected.to_string())];
    }

    let prefix = common_prefix_bytes(expected, actual);
    let (expected_rest, actual_rest) = (&expected[prefix..], &actual[prefix..]);
    let suffix = common_suffix_bytes(expected_rest, actual_rest);
    let expected_mid = &expected_rest[..expected_rest.len() - suffix];
    let actual_mid = &actual_rest[..actual_rest.len() - suffix];

    let mut chunks = Vec::new();
    if prefix > 0 {
        push_chunk(&mut chunks, Chunk::Equal(expected[..prefix].to_string()));
    }
    for chunk in lcs_chunks(&tokenize(expected_mid), &tokenize(actual_mid)) {
        push_chunk(&mut chunks, chunk);
    }
    if suffix > 0 {
        push_chunk(
            &mut chunks,
            Chunk::Equal(expected_rest[expected_rest.len() - suffix..].to_string()),
        );
    }
    chunks
}

/// Split into word tokens and single non-word characters; concatenating the
/// tokens reproduces the input exactly.
fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;
    for (offset, ch) in text.char_indices() {
        if ch.is_alphanumeric() || ch == '_' {
            if word_start.is_none() {
                word_start = Some(offset);
            }
        } else {
            if let Some(start) = word_start.take() {
                tokens.push(&text[start..offset]);
            }
            tokens.push(&text[offset..offset + ch.len_utf8()]);
        }
    }
    if let Some(start) = word_start {
        tokens.push(&text[start..]);
    }
    tokens
}

fn lcs_chunks(expected: &[&str], actual: &[&str]) -> Vec<Chunk> {
    if expected.is_empty() || actual.is_empty() {
        return whole_sides(expected, actual);
    }
    let width = actual.len() + 1;
    let Some(cells) = (expected.len() + 1).checked_mul(width) else {
        return whole_sides(expected, actual);
    };
    if cells > MAX_LCS_CELLS {
        return whole_sides(expected, actual);
    }

    // table[i * width + j] = LCS length of expected[i..] and actual[j..]
    let mut table = vec![0usize; cells];
    for i in (0..expected.len()).rev() {
        for j in (0..actual.len()).rev() {
            table[i * width + j] = if expected[i] == actual[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut chunks = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < expected.len() && j < actual.len() {
        if expected[i] == actual[j] {
            push_chunk(&mut chunks, Chunk::Equal(expected[i].to_string()));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            push_chunk(&mut chunks, Chunk::Delete(expected[i].to_string()));
            i += 1;
        } else {
            push_chunk(&mut chunks, Chunk::Insert(actual[j].to_string()));
            j += 1;
        }
    }
    if i < expected.len() {
        push_chunk(&mut chunks, Chunk::Delete(expected[i..].concat()));
    }
    if j < actual.len() {
        push_chunk(&mut chunks, Chunk::Insert(actual[j..].concat()));
    }
    chunks
}

fn whole_sides(expected: &[&str], actual: &[&str]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    if !expected.is_empty() {
        chunks.push(Chunk::Delete(expected.concat()));
    }
    if !actual.is_empty() {
        chunks.push(Chunk::Insert(actual.concat()));
    }
    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, chunk: Chunk) {
    let merged = match (chunks.last_mut(), &chunk) {
        (Some(Chunk::Equal(prev)), Chunk::Equal(text))
        | (Some(Chunk::Delete(prev)), Chunk::Delete(text))
        | (Some(Chunk::Insert(prev)), Chunk::Insert(text)) => {
            prev.push_str(text);
            true
        }
        _ => false,
    };
    if !merged {
        chunks.push(chunk);
    }
}

/// Fold unchanged islands that are no longer than the edits on both sides
/// back into those edits, so churny small changes read as one coherent one.
#[must_use]
pub fn semantic_cleanup(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    while let Some(index) = foldable_equality(&chunks) {
        let text = match chunks.remove(index) {
            Chunk::Equal(text) => text,
            other => {
                chunks.insert(index, other);
                break;
            }
        };
        chunks.insert(index, Chunk::Insert(text.clone()));
        chunks.insert(index, Chunk::Delete(text));
        chunks = merge_adjacent(chunks);
    }
    chunks
}

fn foldable_equality(chunks: &[Chunk]) -> Option<usize> {
    for index in 1..chunks.len().saturating_sub(1) {
        let Chunk::Equal(text) = &chunks[index] else {
            continue;
        };
        let equality_len = text.chars().count();
        let (delete_before, insert_before) = edit_weights(chunks[..index].iter().rev());
        let (delete_after, insert_after) = edit_weights(chunks[index + 1..].iter());
        if delete_before + insert_before == 0 || delete_after + insert_after == 0 {
            continue;
        }
        if equality_len <= delete_before.max(insert_before)
            && equality_len <= delete_after.max(insert_after)
        {
            return Some(index);
        }
    }
    None
}

/// Character weight of the contiguous edit run at the start of `chunks`.
fn edit_weights<'a>(chunks: impl Iterator<Item = &'a Chunk>) -> (usize, usize) {
    let mut deletes = 0;
    let mut inserts = 0;
    for chunk in chunks {
        match chunk {
            Chunk::Delete(text) => deletes += text.chars().count(),
            Chunk::Insert(text) => inserts += text.chars().count(),
            Chunk::Equal(_) => break,
        }
    }
    (deletes, inserts)
}

fn merge_adjacent(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut out: Vec<Chunk> = Vec::new();
    let mut pending_delete = String::new();
    let mut pending_insert = String::new();

    let flush = |out: &mut Vec<Chunk>, delete: &mut String, insert: &mut String| {
        if !delete.is_empty() {
            out.push(Chunk::Delete(std::mem::take(delete)));
        }
        if !insert.is_empty() {
            out.push(Chunk::Insert(std::mem::take(insert)));
        }
    };

    for chunk in chunks {
        match chunk {
            Chunk::Delete(text) => pending_delete.push_str(&text),
            Chunk::Insert(text) => pending_insert.push_str(&text),
            Chunk::Equal(text) => {
                flush(&mut out, &mut pending_delete, &mut pending_insert);
                push_chunk(&mut out, Chunk::Equal(text));
            }
        }
    }
    flush(&mut out, &mut pending_delete, &mut pending_insert);
    out
}

fn common_prefix_bytes(a: &str, b: &str) -> usize {
    let mut len = 0;
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            break;
        }
        len += ca.len_utf8();
    }
    len
}

fn common_suffix_bytes(a: &str, b: &str) -> usize {
    let mut len = 0;
    for (ca, cb) in a.chars().rev().zip(b.chars().rev()) {
        if ca != cb {
            break;
        }
        len += ca.len_utf8();
    }
    len
}

/// Swap control characters and spaces for their Control Picture glyphs,
/// recording which ones were used. Line feeds keep a real newline after the
/// glyph so multi-line diffs stay multi-line.
fn with_visible_characters(text: &str, used: &mut BTreeSet<char>) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        if ch <= '\u{20}' {
            if let Some(picture) = char::from_u32(0x2400 + ch as u32) {
                used.insert(ch);
                out.push(picture);
                if ch == '\n' {
                    out.push('\n');
                }
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn legend_line(ch: char) -> String {
    let picture = char::from_u32(0x2400 + ch as u32).unwrap_or(ch);
    format!(
        "{picture} represents {} [U+{:04X}]",
        control_character_name(ch),
        ch as u32
    )
}

fn control_character_name(ch: char) -> &'static str {
    match ch as u32 {
        0x00 => "Null (\"\\0\")",
        0x01 => "Start of Heading",
        0x02 => "Start of Text",
        0x03 => "End of Text",
        0x04 => "End of Transmission",
        0x05 => "Enquiry",
        0x06 => "Acknowledge",
        0x07 => "Bell (\"\\a\")",
        0x08 => "Backspace (\"\\b\")",
        0x09 => "Horizontal Tabulation (\"\\t\")",
        0x0A => "Line Feed (\"\\n\")",
        0x0B => "Vertical Tabulation (\"\\v\")",
        0x0C => "Form Feed (\"\\f\")",
        0x0D => "Carriage Return (\"\\r\")",
        0x0E => "Shift Out",
        0x0F => "Shift In",
        0x10 => "Data Link Escape",
        0x11 => "Device Control One",
        0x12 => "Device Control Two",
        0x13 => "Device Control Three",
        0x14 => "Device Control Four",
        0x15 => "Negative Acknowledge",
        0x16 => "Synchronous Idle",
        0x17 => "End of Transmission Block",
        0x18 => "Cancel",
        0x19 => "End of Medium",
        0x1A => "Substitute",
        0x1B => "Escape (\"\\e\")",
        0x1C => "File Separator",
        0x1D => "Group Separator",
        0x1E => "Record Separator",
        0x1F => "Unit Separator",
        _ => "Space (\" \")",
    }
}
