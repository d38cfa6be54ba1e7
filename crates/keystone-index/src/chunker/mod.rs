//! Multi-strategy chunking: one file's text in, ordered chunks with metadata out.
//!
//! The strategy is picked by [`Lang::strategy`]. Every branch fails open: when
//! the finer-grained strategy cannot apply, the whole file becomes one chunk.
//! Chunking never returns an error.

mod cobol;
mod proc;
mod syntax;
pub(crate) mod text;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::languages::{Lang, Strategy};

/// Tag of the whole-file fallback chunk.
pub const FILE_TAG: &str = "file";

/// Metadata stored next to every chunk in the vector store payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub language: Lang,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    /// Zero-based paragraph index for paragraph chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub content_hash: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One retrievable unit of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    #[must_use]
    pub fn new(file_path: &str, lang: Lang, kind: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            metadata: ChunkMetadata {
                file_path: file_path.to_string(),
                kind: kind.into(),
                language: lang,
                start_line: None,
                end_line: None,
                block: None,
                name: None,
                section: None,
                content_hash: blake3_hex(&text),
                extra: BTreeMap::new(),
            },
            text,
        }
    }

    #[must_use]
    pub fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.metadata.start_line = Some(start);
        self.metadata.end_line = Some(end);
        self
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.metadata.kind
    }
}

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Units larger than this many non-whitespace characters are split into
    /// their nested units when they have any (default: 1500).
    pub max_unit_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_unit_size: 1500,
        }
    }
}

/// Split one file into chunks.
///
/// Whitespace-only content produces no chunks. Otherwise at least one chunk
/// is returned, and the output is a pure function of the arguments.
#[must_use]
pub fn chunk_file(file_path: &str, content: &str, lang: Lang, config: &ChunkerConfig) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let chunks = match lang.strategy() {
        Strategy::Syntax => syntax::chunk(file_path, content, lang, config),
        Strategy::CobolDivisions => cobol::chunk(file_path, content, lang),
        Strategy::EmbeddedSql => proc::chunk(file_path, content, lang),
        Strategy::Paragraphs => text::chunk_paragraphs(file_path, content, lang),
        Strategy::WholeFile => Vec::new(),
    };

    if chunks.is_empty() {
        return vec![whole_file(file_path, content, lang)];
    }
    chunks
}

pub(crate) fn whole_file(file_path: &str, content: &str, lang: Lang) -> Chunk {
    Chunk::new(file_path, lang, FILE_TAG, content)
}

pub(crate) fn non_ws_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn blake3_hex(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
pub(crate) fn non_ws(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
