//! Error types for the embedding boundary

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
/// Used throughout the crate for operations that can fail.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Embedding calls cross a collaborator boundary (a local model, a remote
/// API, or the deterministic hash provider), so failures range from bad
/// configuration to transport problems. Each variant carries enough context
/// for the caller to decide what failed. None of them are retried here:
/// retry policy belongs to the collaborator's own transport layer.
///
/// The error type integrates with the [`thiserror`] crate for automatic
/// [`std::error::Error`] implementation and supports error chaining.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error while generating an embedding for a piece of text
    #[error("embedding generation failed: {source}")]
    Generation {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error when the provider configuration is invalid
    #[error("invalid embedder configuration: {message}")]
    InvalidConfig { message: String },

    /// IO errors from providers that touch the filesystem
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from collaborator implementations
    #[error("external error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create a generation error from any error type.
    ///
    /// Convenience constructor for wrapping whatever a provider's transport
    /// returns when an individual embedding call fails.
    pub fn generation<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Generation {
            source: Box::new(source),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
