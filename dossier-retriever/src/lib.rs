//! dossier-retriever: per-document vector indexing and retrieval
//!
//! This crate is the heart of the dossier pipeline: it turns a document's
//! extracted text into a persistent per-document vector index and answers
//! natural-language queries with the top-k most similar chunks, ready to be
//! handed to an answer-generation collaborator.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: the per-document [`DocumentIndex`], the
//!   session-scoped [`IndexRegistry`], and the query-time [`Retriever`]
//! - **[`storage`]**: durable directory-per-document layout with atomic
//!   replace-on-build
//! - **[`error`]**: the typed failure surface of the pipeline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dossier_retriever::retrieval::registry::IndexRegistry;
//! use dossier_retriever::retrieval::retriever::{DocumentSource, Retriever};
//! use dossier_retriever::storage::IndexStorage;
//! use dossier_embed::HashEmbedProvider;
//! use dossier_segment::TextSegmenter;
//! use std::sync::Arc;
//!
//! # struct Extractor;
//! # #[async_trait::async_trait]
//! # impl DocumentSource for Extractor {
//! #     async fn fetch_text(&self, _id: &str) -> anyhow::Result<String> {
//! #         Ok("extracted text".to_string())
//! #     }
//! # }
//! # async fn example() -> anyhow::Result<()> {
//! // One registry per session; indexes build on first touch, load after.
//! let registry = Arc::new(IndexRegistry::new(
//!     IndexStorage::new("./indexes"),
//!     Arc::new(HashEmbedProvider::default()),
//! ));
//! let retriever = Retriever::new(registry, Arc::new(Extractor), TextSegmenter::default());
//!
//! let context = retriever.answer_context("report.pdf", "latest lab results", 4).await?;
//! for scored in context {
//!     println!("{:.3}  {}", scored.score, scored.chunk.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! text ──> Segmenter ──> chunks ──> Embedder ──> DocumentIndex::build
//!                                                      │ (atomic swap)
//! query ──> Embedder ──> vector ──> DocumentIndex::search ──> ranked chunks
//!                 ▲                        ▲
//!            Retriever ──────────── IndexRegistry (session cache,
//!                                        single-flight per document)
//! ```
//!
//! [`DocumentIndex`]: retrieval::document_index::DocumentIndex
//! [`IndexRegistry`]: retrieval::registry::IndexRegistry
//! [`Retriever`]: retrieval::retriever::Retriever

pub mod error;
pub mod retrieval;
pub mod storage;

pub use error::{Result, RetrieverError};
pub use retrieval::document_index::{DocumentIndex, ScoredChunk};
pub use retrieval::registry::IndexRegistry;
pub use retrieval::retriever::{DEFAULT_TOP_K, DocumentSource, Retriever};
pub use storage::IndexStorage;
