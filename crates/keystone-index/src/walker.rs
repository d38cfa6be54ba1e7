//! Streaming corpus walk: files in, bounded batches of chunks out.
//!
//! [`CorpusWalker`] is a pull-based iterator. It only reads ahead as far as
//! needed to fill the next batch, so memory stays bounded by the batch size
//! plus the chunks of a single file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use ignore::{DirEntry, WalkBuilder};

use crate::batch::{Batch, BatchBuilder, DEFAULT_BATCH_SIZE};
use crate::chunker::{ChunkerConfig, chunk_file};
use crate::languages::{Lang, detect_language};

const LARGE_FILE_BYTES: usize = 1024 * 1024;

/// Directory names never descended into.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".svn",
    ".hg",
    "CVS",
    ".DS_Store",
    "dist",
    "build",
    "target",
    ".idea",
    ".vscode",
    ".vs",
];

/// Corpus walker configuration.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub batch_size: usize,
    /// Directory names pruned before descent. Exact, case-sensitive match.
    pub excluded_dirs: Vec<String>,
    /// File extensions skipped, compared case-insensitively. A leading dot is optional.
    pub excluded_extensions: Vec<String>,
    /// Extension to language overrides applied before the built-in table.
    pub language_overrides: HashMap<String, Lang>,
    pub chunker: ChunkerConfig,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(ToString::to_string).collect(),
            excluded_extensions: Vec::new(),
            language_overrides: HashMap::new(),
            chunker: ChunkerConfig::default(),
        }
    }
}

/// Why a file was left out of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file could not be opened or read.
    Unreadable(String),
    /// The directory traversal itself reported an error.
    Walk(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// Counters for one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Files that passed the extension filter.
    pub files_seen: usize,
    /// Files that produced at least one chunk.
    pub files_chunked: usize,
    /// Files read successfully but empty or whitespace-only.
    pub files_empty: usize,
    pub skipped: Vec<SkippedFile>,
    pub chunks: usize,
}

/// Walks a directory tree, chunking every eligible file and yielding batches.
pub struct CorpusWalker {
    root: PathBuf,
    entries: ignore::Walk,
    excluded_extensions: HashSet<String>,
    language_overrides: HashMap<String, Lang>,
    chunker: ChunkerConfig,
    builder: BatchBuilder,
    summary: WalkSummary,
    exhausted: bool,
}

impl CorpusWalker {
    /// Start a walk at `root`. Chunk ids are assigned from `start_id` onwards.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: &WalkerConfig, start_id: u64) -> Self {
        let root = root.into();
        let excluded_dirs: HashSet<String> = config.excluded_dirs.iter().cloned().collect();

        let entries = WalkBuilder::new(&root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| !is_excluded_dir(entry, &excluded_dirs))
            .build();

        Self {
            root,
            entries,
            excluded_extensions: config
                .excluded_extensions
                .iter()
                .map(String::as_str)
                .map(normalize_extension)
                .collect(),
            language_overrides: config
                .language_overrides
                .iter()
                .map(|(ext, lang)| (normalize_extension(ext), *lang))
                .collect(),
            chunker: config.chunker.clone(),
            builder: BatchBuilder::new(start_id, config.batch_size),
            summary: WalkSummary::default(),
            exhausted: false,
        }
    }

    /// Counter value after the last chunk handed out so far. Pass it as the
    /// `start_id` of a following run to keep ids unique.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.builder.next_id()
    }

    #[must_use]
    pub fn summary(&self) -> &WalkSummary {
        &self.summary
    }

    #[must_use]
    pub fn into_summary(self) -> WalkSummary {
        self.summary
    }

    fn visit(&mut self, entry: &DirEntry) {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            return;
        }
        let path = entry.path();
        if let Some(ext) = path.extension().and_then(|e| e.to_str())
            && self.excluded_extensions.contains(&ext.to_ascii_lowercase())
        {
            return;
        }

        self.summary.files_seen += 1;
        let rel_path = relative_path(&self.root, path);

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file = %rel_path, "skipping unreadable file: {e}");
                self.summary.skipped.push(SkippedFile {
                    path: rel_path,
                    reason: SkipReason::Unreadable(e.to_string()),
                });
                return;
            }
        };
        if bytes.len() > LARGE_FILE_BYTES {
            tracing::debug!(file = %rel_path, bytes = bytes.len(), "processing large file");
        }

        let content = decode_permissive(bytes);
        let lang = detect_language(path, &self.language_overrides);
        let chunks = chunk_file(&rel_path, &content, lang, &self.chunker);

        if chunks.is_empty() {
            self.summary.files_empty += 1;
            return;
        }
        tracing::debug!(file = %rel_path, lang = %lang, chunks = chunks.len(), "chunked");
        self.summary.files_chunked += 1;
        self.summary.chunks += chunks.len();
        self.builder.extend(chunks);
    }

    fn record_walk_error(&mut self, err: &ignore::Error) {
        let path = error_path(err).map_or_else(
            || self.root.display().to_string(),
            |p| relative_path(&self.root, p),
        );
        tracing::warn!(file = %path, "walk error: {err}");
        self.summary.skipped.push(SkippedFile {
            path,
            reason: SkipReason::Walk(err.to_string()),
        });
    }
}

impl Iterator for CorpusWalker {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        loop {
            if let Some(batch) = self.builder.take_full() {
                return Some(batch);
            }
            if self.exhausted {
                return self.builder.take_rest();
            }
            match self.entries.next() {
                Some(Ok(entry)) => self.visit(&entry),
                Some(Err(err)) => self.record_walk_error(&err),
                None => {
                    self.exhausted = true;
                    tracing::debug!(
                        files = self.summary.files_seen,
                        chunks = self.summary.chunks,
                        "walk finished"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for CorpusWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusWalker")
            .field("root", &self.root)
            .field("next_id", &self.builder.next_id())
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

fn is_excluded_dir(entry: &DirEntry, excluded: &HashSet<String>) -> bool {
    entry.depth() > 0
        && entry.file_type().is_some_and(|t| t.is_dir())
        && excluded.contains(entry.file_name().to_string_lossy().as_ref())
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Invalid UTF-8 sequences are dropped rather than replaced.
fn decode_permissive(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| {
        e.as_bytes()
            .utf8_chunks()
            .map(|chunk| chunk.valid())
            .collect()
    })
}

fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::FILE_TAG;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn collect(root: &Path, config: &WalkerConfig) -> (Vec<Batch>, CorpusWalker) {
        let mut walker = CorpusWalker::new(root, config, 0);
        let batches: Vec<Batch> = walker.by_ref().collect();
        (batches, walker)
    }

    #[test]
    fn excluded_dirs_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.txt", b"alpha");
        write(dir.path(), "node_modules/pkg/b.txt", b"beta");
        write(dir.path(), ".git/HEAD.txt", b"ref");

        let (batches, walker) = collect(dir.path(), &WalkerConfig::default());
        let texts: Vec<&str> = batches.iter().flat_map(|b| b.texts.iter().map(String::as_str)).collect();
        assert_eq!(texts, vec!["alpha"]);
        assert_eq!(walker.summary().files_seen, 1);
    }

    #[test]
    fn excluded_extensions_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keep.txt", b"keep");
        write(dir.path(), "drop.LOG", b"drop");
        write(dir.path(), "image.png", b"png");

        let config = WalkerConfig {
            excluded_extensions: vec![".log".into(), "PNG".into()],
            ..WalkerConfig::default()
        };
        let (batches, walker) = collect(dir.path(), &config);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].texts, vec!["keep"]);
        assert_eq!(walker.summary().files_seen, 1);
    }

    #[test]
    fn file_paths_are_relative_and_ids_sequential() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/one.txt", b"first\n\nsecond");
        write(dir.path(), "b/two.txt", b"third");

        let (batches, walker) = collect(dir.path(), &WalkerConfig::default());
        let batch = &batches[0];
        assert_eq!(batch.ids, vec!["chunk_0", "chunk_1", "chunk_2"]);
        assert_eq!(batch.metadatas[0].file_path, Path::new("a").join("one.txt").to_string_lossy());
        assert_eq!(batch.metadatas[2].file_path, Path::new("b").join("two.txt").to_string_lossy());
        assert_eq!(walker.next_id(), 3);
    }

    #[test]
    fn batches_respect_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let content = (0..7).map(|i| format!("para {i}")).collect::<Vec<_>>().join("\n\n");
        write(dir.path(), "doc.txt", content.as_bytes());
        write(dir.path(), "more.txt", b"x\n\ny");

        let config = WalkerConfig {
            batch_size: 3,
            ..WalkerConfig::default()
        };
        let (batches, walker) = collect(dir.path(), &config);
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![3, 3, 3]);
        assert_eq!(walker.summary().chunks, 9);
    }

    #[test]
    fn invalid_utf8_bytes_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "latin1.txt", b"caf\xe9 au lait");

        let (batches, walker) = collect(dir.path(), &WalkerConfig::default());
        assert_eq!(batches[0].texts, vec!["caf au lait"]);
        assert!(walker.summary().skipped.is_empty());
    }

    #[test]
    fn empty_files_are_counted_not_chunked() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.py", b"");
        write(dir.path(), "blank.sh", b"  \n\n ");

        let (batches, walker) = collect(dir.path(), &WalkerConfig::default());
        assert!(batches.is_empty());
        assert_eq!(walker.summary().files_seen, 2);
        assert_eq!(walker.summary().files_empty, 2);
        assert_eq!(walker.next_id(), 0);
    }

    #[test]
    fn language_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "PAYROLL.inc", b"01 REC.\n   05 ID PIC 9.\n");

        let mut language_overrides = HashMap::new();
        language_overrides.insert(".INC".to_string(), Lang::Cobol);
        let config = WalkerConfig {
            language_overrides,
            ..WalkerConfig::default()
        };
        let (batches, _) = collect(dir.path(), &config);
        assert_eq!(batches[0].metadatas[0].kind, "fragment");
        assert_eq!(batches[0].metadatas[0].language, Lang::Cobol);
    }

    #[test]
    fn unknown_extension_without_units_is_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "job.jcl", b"//STEP1 EXEC PGM=PAYROLL\n");

        let (batches, _) = collect(dir.path(), &WalkerConfig::default());
        assert_eq!(batches[0].metadatas[0].kind, FILE_TAG);
        assert_eq!(batches[0].metadatas[0].language, Lang::Generic);
    }

    #[test]
    fn start_id_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", b"a");

        let mut walker = CorpusWalker::new(dir.path(), &WalkerConfig::default(), 500);
        let batch = walker.next().unwrap();
        assert_eq!(batch.ids, vec!["chunk_500"]);
        assert!(walker.next().is_none());
        assert_eq!(walker.next_id(), 501);
    }

    #[test]
    fn missing_root_is_recorded_as_walk_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let (batches, walker) = collect(&missing, &WalkerConfig::default());
        assert!(batches.is_empty());
        assert_eq!(walker.summary().skipped.len(), 1);
        assert!(matches!(walker.summary().skipped[0].reason, SkipReason::Walk(_)));
    }
}
