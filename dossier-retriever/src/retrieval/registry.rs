//! Session-scoped registry of live document indexes.
//!
//! The registry is the session-context object of the pipeline: it owns the
//! storage root, the session's embedding provider, and a cache of live
//! [`DocumentIndex`] handles keyed by document id. Create one at session
//! start, share it behind an `Arc`, and drop it at session end; there is no
//! ambient global state.
//!
//! Each key moves through a small state machine: absent from the cache
//! (unloaded), a cell being initialized (loading or building, exclusive per
//! key), then a resolved handle (ready). The per-key exclusivity is what
//! guarantees at most one concurrent build per document: a second caller
//! arriving while a build is in flight waits on the same cell and receives
//! the same handle. Duplicate builds would burn embedding quota and race on
//! the storage key, so the cell is the only path to a build.
//!
//! A failed load or build leaves the cell empty; the next caller retries
//! from scratch rather than caching the failure.

use crate::error::Result;
use crate::retrieval::document_index::DocumentIndex;
use crate::storage::IndexStorage;
use dossier_embed::EmbeddingProvider;
use dossier_segment::TextChunk;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type IndexCell = Arc<OnceCell<Arc<DocumentIndex>>>;

/// Maps document ids to live index handles for one session.
pub struct IndexRegistry {
    storage: IndexStorage,
    embedder: Arc<dyn EmbeddingProvider>,
    cells: Mutex<HashMap<String, IndexCell>>,
}

impl IndexRegistry {
    pub fn new(storage: IndexStorage, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            storage,
            embedder,
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// The embedding provider shared by every index this session touches.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn storage(&self) -> &IndexStorage {
        &self.storage
    }

    /// Returns the index for `document_id`, resolving it in cache → disk →
    /// build order.
    ///
    /// `loader` produces the document's chunk list and runs only when no
    /// persisted index exists; its cost (text extraction plus segmentation)
    /// is paid once per document per storage lifetime. Concurrent callers
    /// for the same id share one load-or-build; callers for different ids
    /// proceed independently.
    pub async fn get_or_build<F, Fut>(
        &self,
        document_id: &str,
        loader: F,
    ) -> Result<Arc<DocumentIndex>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<TextChunk>>>,
    {
        let cell = self.cell(document_id);
        cell.get_or_try_init(|| async {
            if let Some(index) = DocumentIndex::load(&self.storage, document_id).await? {
                tracing::debug!(document_id, "reusing persisted index");
                return Ok(Arc::new(index));
            }
            let chunks = loader().await?;
            let index =
                DocumentIndex::build(&self.storage, document_id, &chunks, self.embedder.as_ref())
                    .await?;
            Ok(Arc::new(index))
        })
        .await
        .map(Arc::clone)
    }

    /// Discards any cached handle and builds a fresh index for
    /// `document_id`, replacing the persisted one on success.
    ///
    /// Reuse-versus-rebuild on re-upload is the caller's decision;
    /// `get_or_build` always reuses, this always rebuilds. The previous
    /// persisted index stays in place until the new build commits, so a
    /// failed rebuild degrades to the old data rather than none. Callers are
    /// expected not to race a rebuild against other writers of the same id.
    pub async fn rebuild<F, Fut>(&self, document_id: &str, loader: F) -> Result<Arc<DocumentIndex>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<TextChunk>>>,
    {
        // Install a fresh cell first so concurrent get_or_build callers wait
        // for this build instead of reading the stale handle.
        let cell: IndexCell = Arc::new(OnceCell::new());
        {
            let mut cells = self.cells.lock().expect("registry cell map poisoned");
            cells.insert(document_id.to_string(), cell.clone());
        }

        cell.get_or_try_init(|| async {
            let chunks = loader().await?;
            let index =
                DocumentIndex::build(&self.storage, document_id, &chunks, self.embedder.as_ref())
                    .await?;
            tracing::info!(document_id, "rebuilt index");
            Ok(Arc::new(index))
        })
        .await
        .map(Arc::clone)
    }

    /// Drops the live handle for `document_id`, if any.
    ///
    /// The persisted index is untouched; the next access loads it instead of
    /// rebuilding. Returns `true` when a handle was cached.
    pub fn evict(&self, document_id: &str) -> bool {
        let mut cells = self.cells.lock().expect("registry cell map poisoned");
        cells.remove(document_id).is_some()
    }

    /// Drops the live handle and deletes the persisted index.
    ///
    /// Returns `true` when persisted data existed. The next `get_or_build`
    /// for this id will run its loader and build from scratch.
    pub async fn remove(&self, document_id: &str) -> Result<bool> {
        self.evict(document_id);
        self.storage.remove(document_id).await
    }

    fn cell(&self, document_id: &str) -> IndexCell {
        // The lock only guards the map itself; it is never held across an
        // await, so slow builds on one key cannot stall lookups on another.
        let mut cells = self.cells.lock().expect("registry cell map poisoned");
        cells.entry(document_id.to_string()).or_default().clone()
    }
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .cells
            .lock()
            .map(|cells| cells.len())
            .unwrap_or_default();
        f.debug_struct("IndexRegistry")
            .field("root", &self.storage.root())
            .field("model", &self.embedder.identity().id())
            .field("cached_handles", &cached)
            .finish()
    }
}
