//! Error types for the retrieval pipeline

use dossier_embed::EmbedError;
use dossier_segment::SegmentError;

/// Result type for retrieval operations.
///
/// This is a convenience type alias that uses [`RetrieverError`] as the
/// error type. Used throughout the crate for operations that can fail.
pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Error type for the index/registry/retriever pipeline.
///
/// Every failure surfaces to the caller as one of these variants; nothing is
/// swallowed or retried inside the core. A missing persisted index is not an
/// error at all: [`DocumentIndex::load`](crate::retrieval::document_index::DocumentIndex::load)
/// returns `Ok(None)` and the registry treats that as the signal to build.
#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// Invalid segmentation geometry, propagated unchanged
    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// The embedding collaborator failed; no partial index is persisted and
    /// no stale result is returned
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// The index records a different build-time embedder than the one used
    /// for the query; scores across models are meaningless, so the query is
    /// refused
    #[error("index was built with embedder {indexed} but queried with {requested}")]
    EmbedderMismatch { indexed: String, requested: String },

    /// Search was requested against an index holding zero chunks
    #[error("index holds no chunks")]
    EmptyIndex,

    /// Search was requested with `k == 0`
    #[error("requested result count must be greater than zero")]
    ZeroLimit,

    /// The query vector's width differs from the index's stored dimension
    #[error("query vector has dimension {actual} but the index stores dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A persisted index exists but cannot be read back coherently
    #[error("persisted index is corrupt: {message}")]
    Corrupt { message: String },

    /// The document-extraction collaborator failed to produce text
    #[error("document source failed: {source}")]
    Source {
        #[source]
        source: anyhow::Error,
    },

    /// Database errors from the index store
    #[error("storage error: {source}")]
    Storage {
        #[from]
        source: sqlx::Error,
    },

    /// IO errors from the filesystem layout around the index store
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl RetrieverError {
    /// Create a corruption error with a custom message.
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
