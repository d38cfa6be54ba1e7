use std::future::Future;

use crate::error::LlmError;

/// Turns text into dense vectors for nearest-neighbour search.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or returns no vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Embed many texts, returning one vector per input in input order.
    ///
    /// The default implementation calls [`embed`](Self::embed) sequentially.
    ///
    /// # Errors
    ///
    /// Returns the first embedding failure.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send {
        async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }
    }

    fn name(&self) -> &'static str;
}
