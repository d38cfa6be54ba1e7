//! Pro*C chunking: embedded `EXEC SQL` statements and C function bodies.
//!
//! A regex finds the start of either construct. Statement ends and function
//! bodies are then found by an explicit scan that respects quotes and
//! comments, so nested braces match correctly.

use std::sync::LazyLock;

use regex::Regex;

use super::Chunk;
use crate::languages::Lang;

static CANDIDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<sql>(?i:\bEXEC\s+SQL\b))",
        r"|(?P<func>(?:\b(?:static|extern|inline|const|unsigned|signed|struct|long|short|volatile|register)\s+)*",
        r"\b\w+(?:\s+|\s*\*+\s*)\w+\s*\([^)]*\)\s*\{)",
    ))
    .unwrap()
});

pub(super) fn chunk(file_path: &str, source: &str, lang: Lang) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut matched = 0usize;
    let mut last_end = 0;
    let mut pos = 0;

    while let Some(caps) = CANDIDATE_RE.captures_at(source, pos) {
        let Some(m) = caps.get(0) else {
            break;
        };
        let (end, tag) = if caps.name("sql").is_some() {
            (statement_end(source, m.end()), "sql_block")
        } else {
            (block_end(source, m.end() - 1), "c_function")
        };

        let Some(end) = end else {
            tracing::trace!(file = %file_path, offset = m.start(), tag, "unterminated candidate");
            pos = m.end();
            continue;
        };

        push_global(file_path, &source[last_end..m.start()], lang, &mut chunks);
        chunks.push(Chunk::new(file_path, lang, tag, &source[m.start()..end]));
        matched += 1;
        last_end = end;
        pos = end;
    }

    if matched == 0 {
        return Vec::new();
    }
    push_global(file_path, &source[last_end..], lang, &mut chunks);
    chunks
}

fn push_global(file_path: &str, text: &str, lang: Lang, out: &mut Vec<Chunk>) {
    let text = text.trim();
    if !text.is_empty() {
        out.push(Chunk::new(file_path, lang, "global_code", text));
    }
}

/// Byte offset just past the `;` ending an embedded statement, skipping
/// semicolons inside quoted literals.
fn statement_end(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b';' => return Some(i + 1),
            None => {}
        }
        i += 1;
    }
    None
}

/// Byte offset just past the `}` matching the `{` at `open`.
///
/// Depth counting skips braces inside string and char literals and comments.
fn block_end(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            q @ (b'"' | b'\'') => i = skip_literal(bytes, i, q),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(bytes.len(), |p| i + p);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 1);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the closing quote of the literal opened at `start`, honouring
/// backslash escapes. An unterminated literal ends at the line break.
fn skip_literal(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'\n' => return i,
            b if b == quote => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}
