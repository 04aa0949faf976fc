//! Embedding provider trait and shared result types

use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of the model that produced a set of embeddings.
///
/// Similarity scores are only meaningful between vectors from the same
/// model, so every index records the identity of the provider that built it
/// and refuses queries from a different one. Two providers are considered
/// the same embedder exactly when their identities are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelIdentity {
    /// Provider family (e.g. "hash", "fastembed", "google-genai")
    pub provider: String,
    /// Model name within the provider (e.g. "trigram-v1", "embedding-001")
    pub model_name: String,
    /// Dimension of the vectors this model produces
    pub dimension: usize,
}

impl ModelIdentity {
    pub fn new(
        provider: impl Into<String>,
        model_name: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            provider: provider.into(),
            model_name: model_name.into(),
            dimension,
        }
    }

    /// Stable string form of this identity, used as the recorded build-time
    /// embedder of a persisted index.
    pub fn id(&self) -> String {
        format!("{}:{}:{}", self.provider, self.model_name, self.dimension)
    }
}

impl std::fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}

/// Result of batch embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of embeddings.
    ///
    /// The dimension is inferred from the first embedding vector; an empty
    /// batch has dimension 0.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text.
///
/// Implementations wrap whatever actually turns text into vectors. The
/// pipeline only requires that a provider produce vectors of the fixed
/// dimension declared by its [`ModelIdentity`], and that per-call failures
/// surface as [`EmbedError`] rather than being retried internally.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Identity of the model backing this provider
    fn identity(&self) -> ModelIdentity;
}

/// Check that every vector in `result` has the provider's declared width.
///
/// Providers that proxy remote APIs can return ragged batches on partial
/// failures; catching that here keeps malformed vectors out of the index.
pub fn ensure_dimension(result: &EmbeddingResult, identity: &ModelIdentity) -> Result<()> {
    for (i, embedding) in result.embeddings.iter().enumerate() {
        if embedding.len() != identity.dimension {
            return Err(EmbedError::invalid_config(format!(
                "embedding {} has dimension {}, model {} declares {}",
                i,
                embedding.len(),
                identity.id(),
                identity.dimension
            )));
        }
    }
    Ok(())
}
