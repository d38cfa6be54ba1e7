use super::Chunk;
use crate::languages::Lang;

pub(crate) const PARAGRAPH_TAG: &str = "paragraph";

/// Split on blank lines. Whitespace-only blocks are dropped; `block` is the
/// index in the raw split, so dropped blocks leave gaps in the numbering.
pub(crate) fn chunk_paragraphs(file_path: &str, source: &str, lang: Lang) -> Vec<Chunk> {
    source
        .split("\n\n")
        .enumerate()
        .filter(|(_, block)| !block.trim().is_empty())
        .map(|(i, block)| {
            let mut chunk = Chunk::new(file_path, lang, PARAGRAPH_TAG, block);
            chunk.metadata.block = Some(i);
            chunk
        })
        .collect()
}
