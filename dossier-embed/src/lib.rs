//! # dossier-embed
//!
//! The embedding boundary of the dossier retrieval pipeline: the trait that
//! turns chunk and query text into fixed-dimension `f32` vectors, the
//! recorded identity of the model that produced them, and a deterministic
//! hashing provider for environments without a real model.
//!
//! ## Design
//!
//! The retrieval core never talks to an embedding backend directly; it only
//! sees [`EmbeddingProvider`]. A provider declares a [`ModelIdentity`]
//! (provider, model name, dimension) and every persisted index records the
//! identity it was built with, so that a query embedded by a different model
//! can be refused instead of silently producing meaningless similarity
//! scores.
//!
//! ## Quick Start
//!
//! ```
//! use dossier_embed::{EmbeddingProvider, HashEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = HashEmbedProvider::default();
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`]
//! type. Per-call failures are recoverable and never retried inside the
//! core; retry policy belongs to a provider's own transport layer.

pub mod error;
pub mod hashing;
pub mod provider;

// Re-export main types for easy access
pub use error::{EmbedError, Result};
pub use hashing::HashEmbedProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, ModelIdentity, ensure_dimension};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provider_roundtrip_through_trait_object() -> anyhow::Result<()> {
        // The pipeline consumes providers as trait objects; make sure the
        // boundary works that way and not just for concrete types.
        let provider: std::sync::Arc<dyn EmbeddingProvider> =
            std::sync::Arc::new(HashEmbedProvider::new(48));

        let vector = provider.embed_text("potassium 4.1 mmol/L").await?;
        assert_eq!(vector.len(), 48);
        assert_eq!(provider.identity().id(), "hash:trigram-v1:48");
        Ok(())
    }
}
