//! Deterministic feature-hashing embedding provider.
//!
//! Hashes character trigrams into a fixed-width normalized vector. Texts
//! sharing surface vocabulary land in overlapping slots and score a higher
//! cosine similarity than unrelated texts, which is enough for offline runs,
//! smoke tests, and any environment where a real embedding model is
//! unavailable. It carries no semantic-quality claims.
//!
//! The provider is fully deterministic: the same text always produces the
//! same vector, across processes and platforms.

use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingResult, ModelIdentity};
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;

/// Default vector width for [`HashEmbedProvider`].
pub const DEFAULT_DIMENSION: usize = 256;

const PROVIDER_NAME: &str = "hash";
const MODEL_NAME: &str = "trigram-v1";

// Sentinel characters framing the text so one- and two-character inputs
// still produce at least one trigram.
const START: char = '\u{2}';
const END: char = '\u{3}';

/// Embedding provider backed by character-trigram feature hashing.
#[derive(Debug, Clone)]
pub struct HashEmbedProvider {
    identity: ModelIdentity,
}

impl Default for HashEmbedProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashEmbedProvider {
    /// Creates a provider producing vectors of the given width.
    pub fn new(dimension: usize) -> Self {
        Self {
            identity: ModelIdentity::new(PROVIDER_NAME, MODEL_NAME, dimension),
        }
    }

    /// Creates a provider reporting a custom model name.
    ///
    /// Vectors are computed the same way; only the reported identity
    /// changes. Useful for exercising embedder-identity checks downstream.
    pub fn with_model_name(model_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            identity: ModelIdentity::new(PROVIDER_NAME, model_name, dimension),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let dimension = self.identity.dimension;
        let mut accum = vec![0.0f32; dimension];

        let chars: Vec<char> = text.to_lowercase().chars().collect();
        if dimension == 0 || chars.is_empty() {
            // Empty text has no features; the zero vector is the honest
            // answer and scores 0.0 against everything.
            return accum;
        }

        let mut framed = Vec::with_capacity(chars.len() + 2);
        framed.push(START);
        framed.extend(chars);
        framed.push(END);

        for gram in framed.windows(3) {
            let mut hasher = FnvHasher::default();
            for &c in gram {
                hasher.write_u32(c as u32);
            }
            let hash = hasher.finish();
            let slot = (hash % dimension as u64) as usize;
            // Signed hashing keeps the expected dot product of unrelated
            // texts near zero instead of drifting positive.
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            accum[slot] += sign;
        }

        let norm: f32 = accum.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut accum {
                *value /= norm;
            }
        }
        accum
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_one(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        tracing::debug!("hash-embedding {} texts", texts.len());
        let embeddings = texts.iter().map(|t| self.embed_one(t)).collect::<Vec<_>>();
        let mut result = EmbeddingResult::new(embeddings);
        // An empty batch still has a width; report the model's.
        result.dimension = self.identity.dimension;
        Ok(result)
    }

    fn identity(&self) -> ModelIdentity {
        self.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn vectors_are_deterministic_and_normalized() -> anyhow::Result<()> {
        let provider = HashEmbedProvider::new(64);

        let first = provider.embed_text("cholesterol 180 mg/dL").await?;
        let second = provider.embed_text("cholesterol 180 mg/dL").await?;
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        let norm: f32 = first.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[tokio::test]
    async fn related_text_scores_above_unrelated() -> anyhow::Result<()> {
        tracing_subscriber::fmt().try_init().ok(); // Ignore if already initialized
        let provider = HashEmbedProvider::default();

        let query = provider.embed_text("blood pressure reading").await?;
        let related = provider.embed_text("blood pressure was 120/80").await?;
        let unrelated = provider.embed_text("quarterly tax filing 2023").await?;

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
        Ok(())
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() -> anyhow::Result<()> {
        let provider = HashEmbedProvider::new(16);
        let vector = provider.embed_text("").await?;
        assert!(vector.iter().all(|v| *v == 0.0));
        Ok(())
    }

    #[tokio::test]
    async fn batch_matches_single_calls() -> anyhow::Result<()> {
        let provider = HashEmbedProvider::new(32);
        let texts = vec!["first note".to_string(), "second note".to_string()];

        let batch = provider.embed_texts(&texts).await?;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.dimension, 32);
        assert_eq!(batch.embeddings[0], provider.embed_text("first note").await?);
        assert_eq!(batch.embeddings[1], provider.embed_text("second note").await?);
        Ok(())
    }

    #[test]
    fn custom_model_name_changes_identity_only() {
        let a = HashEmbedProvider::new(8);
        let b = HashEmbedProvider::with_model_name("model-b", 8);
        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.identity().dimension, b.identity().dimension);
    }
}
