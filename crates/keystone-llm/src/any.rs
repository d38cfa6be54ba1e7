#[cfg(feature = "mock")]
use crate::mock::MockEmbedder;
use crate::ollama::OllamaEmbedder;

use crate::error::LlmError;
use crate::provider::EmbeddingProvider;

macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Ollama($p) => $expr,
            #[cfg(feature = "mock")]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

/// Static dispatch over the configured embedding backends.
#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Ollama(OllamaEmbedder),
    #[cfg(feature = "mock")]
    Mock(MockEmbedder),
}

impl AnyEmbedder {
    /// Build an embedder from a provider name as written in config.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::UnknownProvider`] for names without a compiled backend.
    pub fn from_name(provider: &str, base_url: &str, model: &str) -> Result<Self, LlmError> {
        match provider {
            "ollama" => Ok(Self::Ollama(OllamaEmbedder::new(base_url, model.to_owned()))),
            #[cfg(feature = "mock")]
            "mock" => Ok(Self::Mock(MockEmbedder::default())),
            other => Err(LlmError::UnknownProvider(other.to_owned())),
        }
    }
}

impl EmbeddingProvider for AnyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        delegate_embedder!(self, |p| p.embed(text).await)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        delegate_embedder!(self, |p| p.embed_batch(texts).await)
    }

    fn name(&self) -> &'static str {
        delegate_embedder!(self, |p| p.name())
    }
}
