//! Bounded batches of chunks with run-unique ids.

use std::collections::VecDeque;

use crate::chunker::{Chunk, ChunkMetadata};

/// Default number of chunks per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Three aligned sequences: chunk texts, their metadata and their ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub texts: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub ids: Vec<String>,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True when all three sequences have the same length.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.texts.len() == self.ids.len() && self.metadatas.len() == self.ids.len()
    }
}

/// Assigns `chunk_<n>` ids from a counter threaded in by the caller and cuts
/// the chunk stream into batches of at most `batch_size`.
#[derive(Debug)]
pub struct BatchBuilder {
    pending: VecDeque<(String, Chunk)>,
    next_id: u64,
    batch_size: usize,
}

impl BatchBuilder {
    /// A zero batch size is treated as one.
    #[must_use]
    pub fn new(start_id: u64, batch_size: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            next_id: start_id,
            batch_size: batch_size.max(1),
        }
    }

    pub fn push(&mut self, chunk: Chunk) {
        let id = format!("chunk_{}", self.next_id);
        self.next_id += 1;
        self.pending.push_back((id, chunk));
    }

    pub fn extend(&mut self, chunks: impl IntoIterator<Item = Chunk>) {
        for chunk in chunks {
            self.push(chunk);
        }
    }

    /// A full batch, if enough chunks are pending.
    pub fn take_full(&mut self) -> Option<Batch> {
        (self.pending.len() >= self.batch_size).then(|| self.take(self.batch_size))
    }

    /// Whatever is pending, if anything.
    pub fn take_rest(&mut self) -> Option<Batch> {
        (!self.pending.is_empty()).then(|| self.take(self.pending.len()))
    }

    /// The id counter value the next chunk would receive.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn take(&mut self, n: usize) -> Batch {
        let mut batch = Batch {
            texts: Vec::with_capacity(n),
            metadatas: Vec::with_capacity(n),
            ids: Vec::with_capacity(n),
        };
        for (id, chunk) in self.pending.drain(..n) {
            batch.texts.push(chunk.text);
            batch.metadatas.push(chunk.metadata);
            batch.ids.push(id);
        }
        batch
    }
}
