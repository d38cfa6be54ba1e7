#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("embedding request to {provider} failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("{provider} returned {got} embeddings for {expected} inputs")]
    CountMismatch {
        provider: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("unknown embedding provider: {0}")]
    UnknownProvider(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
