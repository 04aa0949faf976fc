//! Per-document SQLite vector index.
//!
//! One document gets one index: its chunks, their embedding vectors, and the
//! identity of the model that produced those vectors, all in a single SQLite
//! database under the storage root. The lifecycle is deliberately coarse:
//! an index is built once from a chunk list, reloaded from disk on later
//! access, and never partially updated. Rebuilding means building a fresh
//! index and atomically swapping it in.
//!
//! ## Database Schema
//!
//! ```sql
//! -- One-row table describing the index
//! CREATE TABLE index_meta (
//!     id INTEGER PRIMARY KEY CHECK (id = 1),
//!     document_id TEXT NOT NULL,       -- caller-chosen opaque id
//!     model_id TEXT NOT NULL,          -- flat embedder identity for inspection
//!     model_json TEXT NOT NULL,        -- full ModelIdentity, JSON
//!     dimension INTEGER NOT NULL,      -- vector width
//!     chunk_count INTEGER NOT NULL,
//!     schema_version INTEGER NOT NULL,
//!     created_at INTEGER NOT NULL      -- unix timestamp
//! );
//!
//! -- Chunk text plus embedding, one row per window
//! CREATE TABLE chunks (
//!     sequence INTEGER PRIMARY KEY,    -- 0-based position in the document
//!     content TEXT NOT NULL,
//!     embedding BLOB NOT NULL          -- dimension * 4 bytes of f32
//! );
//! ```
//!
//! Vectors are stored as raw `f32` bytes, so a load reproduces exactly the
//! values the embedder returned at build time; similarity ranks identically
//! before and after a restart.
//!
//! ## SQLite configuration
//!
//! WAL journaling with a busy timeout, so concurrent read-only searches
//! against a built index never block each other.

use crate::error::{Result, RetrieverError};
use crate::storage::IndexStorage;
use dossier_embed::{EmbeddingProvider, ModelIdentity, ensure_dimension};
use dossier_segment::TextChunk;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::cmp::Ordering;
use std::path::Path;

/// Version of the on-disk layout; bumped when the schema changes shape.
const SCHEMA_VERSION: i64 = 1;

/// One retrieved chunk together with its cosine similarity to the query.
///
/// Serializable so the presentation layer can pass ranked context straight
/// to the answer-generation collaborator.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// The vector index of a single document.
///
/// Holds an open connection pool to the document's database plus the
/// metadata needed to answer searches without touching disk for anything
/// but the chunk rows. Handles are shared as `Arc<DocumentIndex>`; searches
/// take `&self` and are safe to run concurrently.
#[derive(Debug)]
pub struct DocumentIndex {
    document_id: String,
    model: ModelIdentity,
    chunk_count: usize,
    pool: SqlitePool,
}

impl DocumentIndex {
    /// Embeds `chunks` in order and persists a fresh index for
    /// `document_id`, replacing any previous one atomically.
    ///
    /// Build is all-or-nothing: every write lands in a staged directory and
    /// the swap into place happens only after the database is complete, so
    /// a failed embedding call or a crash mid-build leaves prior persisted
    /// data for the key untouched.
    pub async fn build(
        storage: &IndexStorage,
        document_id: &str,
        chunks: &[TextChunk],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let model = embedder.identity();
        tracing::info!(
            document_id,
            model = %model,
            chunks = chunks.len(),
            "building vector index"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let batch = embedder.embed_texts(&texts).await?;
        if batch.len() != chunks.len() {
            return Err(RetrieverError::Embedding(dossier_embed::EmbedError::invalid_config(
                format!(
                    "embedder returned {} vectors for {} chunks",
                    batch.len(),
                    chunks.len()
                ),
            )));
        }
        ensure_dimension(&batch, &model)?;

        let staged = storage.stage().await?;
        let pool = open_pool(&staged.path().join(IndexStorage::DB_FILE), true).await?;
        create_tables(&pool).await?;

        let mut tx = pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO index_meta
            (id, document_id, model_id, model_json, dimension, chunk_count, schema_version, created_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(document_id)
        .bind(model.id())
        .bind(
            serde_json::to_string(&model)
                .map_err(|e| RetrieverError::corrupt(format!("unserializable model identity: {e}")))?,
        )
        .bind(model.dimension as i64)
        .bind(chunks.len() as i64)
        .bind(SCHEMA_VERSION)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        for (chunk, embedding) in chunks.iter().zip(&batch.embeddings) {
            sqlx::query("INSERT INTO chunks (sequence, content, embedding) VALUES (?1, ?2, ?3)")
                .bind(chunk.sequence as i64)
                .bind(&chunk.text)
                .bind(bytemuck::cast_slice::<f32, u8>(embedding))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        // Close before the rename so the WAL is checkpointed into the main
        // database file and nothing holds the staged directory open.
        pool.close().await;
        let dir = storage.commit(staged, document_id).await?;

        let pool = open_pool(&dir.join(IndexStorage::DB_FILE), false).await?;
        Ok(Self {
            document_id: document_id.to_string(),
            model,
            chunk_count: chunks.len(),
            pool,
        })
    }

    /// Opens the persisted index for `document_id` without recomputing any
    /// embeddings. Returns `Ok(None)` if the key has never been built; that
    /// absence is the registry's build trigger, not an error.
    pub async fn load(storage: &IndexStorage, document_id: &str) -> Result<Option<Self>> {
        let db_path = storage.db_path(document_id);
        if !tokio::fs::try_exists(&db_path).await? {
            return Ok(None);
        }

        let pool = open_pool(&db_path, false).await?;
        let row = sqlx::query(
            "SELECT document_id, model_json, dimension, chunk_count, schema_version FROM index_meta WHERE id = 1",
        )
        .fetch_optional(&pool)
        .await?;

        let Some(row) = row else {
            pool.close().await;
            return Err(RetrieverError::corrupt("index database has no metadata row"));
        };

        let schema_version: i64 = row.get("schema_version");
        if schema_version != SCHEMA_VERSION {
            pool.close().await;
            return Err(RetrieverError::corrupt(format!(
                "unsupported index schema version {schema_version}"
            )));
        }

        let stored_id: String = row.get("document_id");
        if stored_id != document_id {
            pool.close().await;
            return Err(RetrieverError::corrupt(format!(
                "index at this key belongs to document '{stored_id}'"
            )));
        }

        let model_json: String = row.get("model_json");
        let model: ModelIdentity = serde_json::from_str(&model_json)
            .map_err(|e| RetrieverError::corrupt(format!("unreadable model identity: {e}")))?;

        let dimension: i64 = row.get("dimension");
        if dimension as usize != model.dimension {
            pool.close().await;
            return Err(RetrieverError::corrupt(format!(
                "metadata dimension {dimension} disagrees with model identity {}",
                model.id()
            )));
        }
        let chunk_count: i64 = row.get("chunk_count");

        tracing::info!(document_id, model = %model, chunks = chunk_count, "loaded vector index");
        Ok(Some(Self {
            document_id: document_id.to_string(),
            model,
            chunk_count: chunk_count as usize,
            pool,
        }))
    }

    /// Returns the `k` stored chunks most similar to `query`, ordered by
    /// descending cosine similarity with ties broken by ascending sequence.
    ///
    /// If the index holds fewer than `k` chunks, all of them are returned in
    /// the same order.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RetrieverError::ZeroLimit);
        }
        if query.len() != self.model.dimension {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.model.dimension,
                actual: query.len(),
            });
        }

        let rows = sqlx::query("SELECT sequence, content, embedding FROM chunks ORDER BY sequence")
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Err(RetrieverError::EmptyIndex);
        }

        let mut scored: Vec<(f32, usize, String)> = Vec::with_capacity(rows.len());
        for row in rows {
            let sequence: i64 = row.get("sequence");
            let content: String = row.get("content");
            let blob: Vec<u8> = row.get("embedding");

            if blob.len() != self.model.dimension * std::mem::size_of::<f32>() {
                return Err(RetrieverError::corrupt(format!(
                    "chunk {sequence} stores {} bytes, expected {}",
                    blob.len(),
                    self.model.dimension * std::mem::size_of::<f32>()
                )));
            }
            let embedding: Vec<f32> = bytemuck::pod_collect_to_vec(&blob);

            scored.push((
                cosine_similarity(query, &embedding),
                sequence as usize,
                content,
            ));
        }

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(k);

        tracing::debug!(
            document_id = self.document_id,
            returned = scored.len(),
            "searched vector index"
        );
        Ok(scored
            .into_iter()
            .map(|(score, sequence, text)| ScoredChunk {
                chunk: TextChunk { sequence, text },
                score,
            })
            .collect())
    }

    /// All stored chunks with their vectors, in sequence order.
    pub async fn chunks(&self) -> Result<Vec<(TextChunk, Vec<f32>)>> {
        let rows = sqlx::query("SELECT sequence, content, embedding FROM chunks ORDER BY sequence")
            .fetch_all(&self.pool)
            .await?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in rows {
            let sequence: i64 = row.get("sequence");
            let content: String = row.get("content");
            let blob: Vec<u8> = row.get("embedding");
            chunks.push((
                TextChunk {
                    sequence: sequence as usize,
                    text: content,
                },
                bytemuck::pod_collect_to_vec(&blob),
            ));
        }
        Ok(chunks)
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Identity of the embedder this index was built with.
    pub fn model(&self) -> &ModelIdentity {
        &self.model
    }

    /// Number of chunks stored in the index.
    pub fn len(&self) -> usize {
        self.chunk_count
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_count == 0
    }
}

async fn open_pool(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(create),
    )
    .await?;
    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            document_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            model_json TEXT NOT NULL,
            dimension INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL,
            schema_version INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            sequence INTEGER PRIMARY KEY,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Cosine similarity between two equal-length vectors.
///
/// Chosen over the raw dot product because embedding backends do not
/// normalize magnitudes consistently; the angle is comparable even when the
/// norms are not. A zero vector scores 0.0 against everything.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use dossier_embed::{EmbedError, EmbeddingResult};
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// Embedder that returns pre-assigned vectors, so tests control the
    /// geometry exactly.
    struct ScriptedEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        dimension: usize,
    }

    impl ScriptedEmbedder {
        fn new(pairs: &[(&str, Vec<f32>)]) -> Self {
            let dimension = pairs.first().map(|(_, v)| v.len()).unwrap_or(0);
            Self {
                vectors: pairs
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.clone()))
                    .collect(),
                dimension,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedEmbedder {
        async fn embed_text(&self, text: &str) -> dossier_embed::Result<Vec<f32>> {
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| EmbedError::invalid_config(format!("no scripted vector for '{text}'")))
        }

        async fn embed_texts(&self, texts: &[String]) -> dossier_embed::Result<EmbeddingResult> {
            let mut embeddings = Vec::with_capacity(texts.len());
            for text in texts {
                embeddings.push(self.embed_text(text).await?);
            }
            Ok(EmbeddingResult::new(embeddings))
        }

        fn identity(&self) -> ModelIdentity {
            ModelIdentity::new("test", "scripted", self.dimension)
        }
    }

    fn chunk(sequence: usize, text: &str) -> TextChunk {
        TextChunk {
            sequence,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn ranking_returns_top_k_in_descending_order() -> Result<()> {
        let dir = tempdir()?;
        let storage = IndexStorage::new(dir.path());
        let embedder = ScriptedEmbedder::new(&[
            ("a", vec![1.0, 0.0, 0.0, 0.0]),
            ("b", vec![0.0, 1.0, 0.0, 0.0]),
            ("c", vec![0.0, 0.0, 1.0, 0.0]),
            ("d", vec![0.0, 0.0, 0.0, 1.0]),
            ("e", vec![0.5, 0.5, 0.5, 0.5]),
        ]);
        let chunks: Vec<TextChunk> = ["a", "b", "c", "d", "e"]
            .iter()
            .enumerate()
            .map(|(i, t)| chunk(i, t))
            .collect();

        let index = DocumentIndex::build(&storage, "doc", &chunks, &embedder).await?;

        // Against [1.0, 0.2, 0.1, 0.0]: a scores ~0.976, e ~0.634, b ~0.195,
        // c ~0.098, d 0.0.
        let query = [1.0, 0.2, 0.1, 0.0];
        let top = index.search(&query, 3).await?;

        let sequences: Vec<usize> = top.iter().map(|s| s.chunk.sequence).collect();
        assert_eq!(sequences, vec![0, 4, 1]);
        assert!(top[0].score > top[1].score && top[1].score > top[2].score);

        // k larger than the index returns everything, still ordered.
        let all = index.search(&query, 10).await?;
        assert_eq!(all.len(), 5);
        let all_sequences: Vec<usize> = all.iter().map(|s| s.chunk.sequence).collect();
        assert_eq!(all_sequences, vec![0, 4, 1, 2, 3]);
        for pair in all.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        Ok(())
    }

    #[tokio::test]
    async fn equal_scores_break_ties_by_sequence() -> Result<()> {
        let dir = tempdir()?;
        let storage = IndexStorage::new(dir.path());
        let embedder = ScriptedEmbedder::new(&[
            ("twin one", vec![1.0, 0.0]),
            ("twin two", vec![1.0, 0.0]),
            ("other", vec![0.0, 1.0]),
        ]);
        let chunks = vec![chunk(0, "twin one"), chunk(1, "twin two"), chunk(2, "other")];
        let index = DocumentIndex::build(&storage, "doc", &chunks, &embedder).await?;

        let results = index.search(&[1.0, 0.0], 3).await?;
        let sequences: Vec<usize> = results.iter().map(|s| s.chunk.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(results[0].score, results[1].score);
        Ok(())
    }

    #[tokio::test]
    async fn load_round_trips_chunks_and_vectors_exactly() -> Result<()> {
        let dir = tempdir()?;
        let storage = IndexStorage::new(dir.path());
        let embedder = ScriptedEmbedder::new(&[
            ("alpha", vec![0.25, -1.5, 3.625]),
            ("beta", vec![f32::MIN_POSITIVE, 1e-7, -0.0]),
        ]);
        let chunks = vec![chunk(0, "alpha"), chunk(1, "beta")];

        let built = DocumentIndex::build(&storage, "doc", &chunks, &embedder).await?;
        let built_chunks = built.chunks().await?;
        drop(built);

        let loaded = DocumentIndex::load(&storage, "doc")
            .await?
            .expect("index should exist after build");

        assert_eq!(loaded.document_id(), "doc");
        assert_eq!(loaded.model(), &embedder.identity());
        assert_eq!(loaded.len(), 2);

        let loaded_chunks = loaded.chunks().await?;
        assert_eq!(loaded_chunks, built_chunks);
        assert_eq!(loaded_chunks[0].0.text, "alpha");
        assert_eq!(loaded_chunks[0].1, vec![0.25, -1.5, 3.625]);
        assert_eq!(loaded_chunks[1].1, vec![f32::MIN_POSITIVE, 1e-7, -0.0]);
        Ok(())
    }

    #[tokio::test]
    async fn load_of_unknown_key_is_none() -> Result<()> {
        let dir = tempdir()?;
        let storage = IndexStorage::new(dir.path());
        assert!(DocumentIndex::load(&storage, "never-built").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn failed_embedding_leaves_nothing_persisted() -> Result<()> {
        let dir = tempdir()?;
        let storage = IndexStorage::new(dir.path());
        // Only "known" has a scripted vector; the second chunk fails.
        let embedder = ScriptedEmbedder::new(&[("known", vec![1.0, 0.0])]);
        let chunks = vec![chunk(0, "known"), chunk(1, "unknown")];

        let result = DocumentIndex::build(&storage, "doc", &chunks, &embedder).await;
        assert!(matches!(result, Err(RetrieverError::Embedding(_))));
        assert!(DocumentIndex::load(&storage, "doc").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_index_intact() -> Result<()> {
        let dir = tempdir()?;
        let storage = IndexStorage::new(dir.path());
        let embedder = ScriptedEmbedder::new(&[("original", vec![1.0, 0.0])]);
        let chunks = vec![chunk(0, "original")];
        DocumentIndex::build(&storage, "doc", &chunks, &embedder).await?;

        let failing = ScriptedEmbedder::new(&[("something else", vec![0.0, 1.0])]);
        let result = DocumentIndex::build(&storage, "doc", &chunks, &failing).await;
        assert!(result.is_err());

        let survivor = DocumentIndex::load(&storage, "doc")
            .await?
            .expect("previous index must survive a failed rebuild");
        assert_eq!(survivor.chunks().await?[0].0.text, "original");
        Ok(())
    }

    #[tokio::test]
    async fn search_guards_reject_bad_requests() -> Result<()> {
        let dir = tempdir()?;
        let storage = IndexStorage::new(dir.path());
        let embedder = ScriptedEmbedder::new(&[("only", vec![1.0, 0.0])]);
        let index =
            DocumentIndex::build(&storage, "doc", &[chunk(0, "only")], &embedder).await?;

        assert!(matches!(
            index.search(&[1.0, 0.0], 0).await,
            Err(RetrieverError::ZeroLimit)
        ));
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1).await,
            Err(RetrieverError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn empty_index_refuses_search() -> Result<()> {
        let dir = tempdir()?;
        let storage = IndexStorage::new(dir.path());
        let embedder = ScriptedEmbedder::new(&[("unused", vec![1.0, 0.0])]);
        let index = DocumentIndex::build(&storage, "doc", &[], &embedder).await?;

        assert!(index.is_empty());
        assert!(matches!(
            index.search(&[1.0, 0.0], 3).await,
            Err(RetrieverError::EmptyIndex)
        ));
        Ok(())
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        // Magnitude must not matter.
        assert!(
            (cosine_similarity(&[2.0, 0.0], &[0.5, 0.0]) - 1.0).abs() < 1e-6
        );
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
