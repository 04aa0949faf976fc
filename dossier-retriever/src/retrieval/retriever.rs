//! Query-time orchestration: resolve the index, embed the question, rank.

use crate::error::{Result, RetrieverError};
use crate::retrieval::document_index::{DocumentIndex, ScoredChunk};
use crate::retrieval::registry::IndexRegistry;
use async_trait::async_trait;
use dossier_segment::TextSegmenter;
use std::sync::Arc;

/// Default number of chunks handed to the answer-generation collaborator,
/// matching the original assistant's slider default.
pub const DEFAULT_TOP_K: usize = 4;

/// Boundary to the text-extraction collaborator.
///
/// The core never opens PDF/DOCX/TXT containers itself; it asks this trait
/// for the extracted text of a document id and treats the result as opaque
/// text to normalize and segment.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_text(&self, document_id: &str) -> anyhow::Result<String>;
}

/// Turns questions about one document into ranked context passages.
///
/// Owns nothing global: the registry is the session state, the source is the
/// extraction collaborator, and the segmenter fixes the window geometry for
/// any index this retriever builds. Answer generation happens elsewhere;
/// this type stops at ranked chunks.
pub struct Retriever {
    registry: Arc<IndexRegistry>,
    source: Arc<dyn DocumentSource>,
    segmenter: TextSegmenter,
}

impl Retriever {
    pub fn new(
        registry: Arc<IndexRegistry>,
        source: Arc<dyn DocumentSource>,
        segmenter: TextSegmenter,
    ) -> Self {
        Self {
            registry,
            source,
            segmenter,
        }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    /// Returns the `k` chunks of `document_id` most relevant to `query`,
    /// building or loading the document's index as needed.
    ///
    /// The query string is embedded exactly as given; segment-time
    /// normalization applies to document text only. Before searching, the
    /// index's recorded build-time embedder is checked against the session
    /// embedder, and a mismatch refuses the query rather than ranking
    /// vectors from two different models against each other.
    pub async fn answer_context(
        &self,
        document_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let index = self.index_for(document_id).await?;

        let embedder = self.registry.embedder();
        let requested = embedder.identity();
        if requested != *index.model() {
            return Err(RetrieverError::EmbedderMismatch {
                indexed: index.model().id(),
                requested: requested.id(),
            });
        }

        let query_vector = embedder.embed_text(query).await?;
        let results = index.search(&query_vector, k).await?;
        tracing::debug!(
            document_id,
            k,
            returned = results.len(),
            "retrieved context for query"
        );
        Ok(results)
    }

    /// Resolves the live index for `document_id`, extracting and segmenting
    /// the document only if no persisted index exists yet.
    pub async fn index_for(&self, document_id: &str) -> Result<Arc<DocumentIndex>> {
        self.registry
            .get_or_build(document_id, || async {
                let text = self
                    .source
                    .fetch_text(document_id)
                    .await
                    .map_err(|source| RetrieverError::Source { source })?;
                let chunks = self.segmenter.segment(&text);
                tracing::debug!(
                    document_id,
                    characters = text.chars().count(),
                    chunks = chunks.len(),
                    "segmented document for indexing"
                );
                Ok(chunks)
            })
            .await
    }

    /// Re-extracts the document and rebuilds its index, replacing the
    /// persisted one. This is the explicit path for re-uploaded documents;
    /// `answer_context` alone never rebuilds.
    pub async fn reindex(&self, document_id: &str) -> Result<Arc<DocumentIndex>> {
        self.registry
            .rebuild(document_id, || async {
                let text = self
                    .source
                    .fetch_text(document_id)
                    .await
                    .map_err(|source| RetrieverError::Source { source })?;
                Ok(self.segmenter.segment(&text))
            })
            .await
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("registry", &self.registry)
            .field("segmenter", &self.segmenter)
            .finish()
    }
}
