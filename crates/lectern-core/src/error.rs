//! Error taxonomy shared across the workspace.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LecternError>;

#[derive(Debug, Error)]
pub enum LecternError {
    /// Bad chunking parameters, malformed filters, empty questions.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Tool failure. Converted to text before it reaches the LLM loop.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Embedding, LLM or store backend failed after retries.
    #[error("Backend unavailable ({backend}): {message}")]
    BackendUnavailable { backend: String, message: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("API key missing for provider: {0}")]
    ApiKeyMissing(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Query timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl LecternError {
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Network-class failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Provider(msg) => {
                msg.contains(" 429")
                    || msg.contains(" 500")
                    || msg.contains(" 502")
                    || msg.contains(" 503")
                    || msg.contains(" 504")
                    || msg.contains("overloaded")
            }
            _ => false,
        }
    }

    /// Errors caused by the caller rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::UnknownSession(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LecternError::Http("connection reset".into()).is_transient());
        assert!(LecternError::Provider("openai API error 503 Service Unavailable".into()).is_transient());
        assert!(!LecternError::Provider("openai API error 401 Unauthorized".into()).is_transient());
        assert!(!LecternError::InvalidArgument("x".into()).is_transient());
    }

    #[test]
    fn test_client_errors() {
        assert!(LecternError::UnknownSession("abc".into()).is_client_error());
        assert!(LecternError::InvalidArgument("overlap".into()).is_client_error());
        assert!(!LecternError::backend("llm", "down").is_client_error());
    }

    #[test]
    fn test_display_messages() {
        let e = LecternError::backend("embedding", "connection refused");
        assert_eq!(e.to_string(), "Backend unavailable (embedding): connection refused");
        assert_eq!(LecternError::Timeout(30).to_string(), "Query timed out after 30s");
    }
}
