//! Prose documents (runbooks, design notes) turned into the same chunk shape
//! the corpus walker produces.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use keystone_memory::document::{Document, DocumentLoader};

use crate::chunker::{Chunk, text::chunk_paragraphs};
use crate::languages::Lang;

/// Split a loaded document into paragraph chunks. `file_path` is the
/// document source and every chunk carries the document title.
#[must_use]
pub fn document_chunks(doc: &Document) -> Vec<Chunk> {
    let mut chunks = chunk_paragraphs(&doc.metadata.source, &doc.content, Lang::Document);
    for chunk in &mut chunks {
        chunk.metadata.extra.insert(
            "title".into(),
            serde_json::Value::String(doc.metadata.title.clone()),
        );
        for (key, value) in &doc.metadata.extra {
            chunk
                .metadata
                .extra
                .entry(key.clone())
                .or_insert_with(|| serde_json::Value::String(value.clone()));
        }
    }
    chunks
}

/// Files under `root` the loader can read, in file name order. A file path
/// is returned as is when its extension is supported.
#[must_use]
pub fn document_paths(root: &Path, loader: &dyn DocumentLoader, excluded_dirs: &[String]) -> Vec<PathBuf> {
    let supported = |path: &Path| {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                loader
                    .supported_extensions()
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(ext))
            })
    };

    if root.is_file() {
        return if supported(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let excluded: Vec<String> = excluded_dirs.to_vec();
    WalkBuilder::new(root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            entry.depth() == 0
                || !entry.file_type().is_some_and(|t| t.is_dir())
                || !excluded.iter().any(|d| entry.file_name() == d.as_str())
        })
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("document walk error: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| supported(path))
        .collect()
}
