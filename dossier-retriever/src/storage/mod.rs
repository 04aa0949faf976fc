//! Durable storage layout for per-document indexes.
//!
//! Each document's index lives in its own directory under a common root,
//! named by the BLAKE3 hash of the document id so that opaque ids (paths,
//! content hashes, anything the caller chooses) stay filesystem-safe. The
//! directory holds a single SQLite database file.
//!
//! ## Replace-on-build semantics
//!
//! Builds never write into a live index directory. A build stages its
//! database in a scratch directory next to the final location, then
//! [`IndexStorage::commit`] swaps it in: the previous directory (if any) is
//! renamed aside, the staged one renamed into place, and the old data
//! deleted. A build that fails before `commit` leaves the prior index
//! untouched, and the scratch directory cleans itself up when dropped.
//!
//! ```text
//! <root>/
//!   <blake3(document_id)>/index.db     <- live index
//!   .staged-XXXX/index.db              <- in-flight build (TempDir)
//! ```

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Filesystem layout and atomic-replace operations for index directories.
///
/// One `IndexStorage` corresponds to one index root shared by all documents
/// of a deployment. It is cheap to clone paths out of and holds no open
/// handles itself.
#[derive(Debug, Clone)]
pub struct IndexStorage {
    root: PathBuf,
}

impl IndexStorage {
    /// Name of the database file inside every index directory.
    pub const DB_FILE: &'static str = "index.db";

    /// Creates a storage layout rooted at `root`. The directory is created
    /// lazily on first build.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable directory name for a document id.
    ///
    /// Ids are opaque caller-chosen strings; hashing keeps slashes, dots,
    /// and case collisions out of the directory layout.
    pub fn storage_key(document_id: &str) -> String {
        blake3::hash(document_id.as_bytes()).to_hex().to_string()
    }

    /// Directory that holds (or would hold) the index for `document_id`.
    pub fn index_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(Self::storage_key(document_id))
    }

    /// Path of the database file for `document_id`.
    pub fn db_path(&self, document_id: &str) -> PathBuf {
        self.index_dir(document_id).join(Self::DB_FILE)
    }

    /// Creates a scratch directory for an in-flight build.
    ///
    /// The directory lives under the storage root so the final rename in
    /// [`commit`](Self::commit) stays on one filesystem. Dropping the
    /// returned [`TempDir`] without committing removes it.
    pub(crate) async fn stage(&self) -> Result<TempDir> {
        tokio::fs::create_dir_all(&self.root).await?;
        let staged = tempfile::Builder::new()
            .prefix(".staged-")
            .tempdir_in(&self.root)?;
        Ok(staged)
    }

    /// Swaps a staged build into place as the live index for `document_id`.
    ///
    /// If a previous index exists it is renamed aside before the staged
    /// directory moves in, and restored if that move fails; the old data is
    /// deleted only after the new index is in place.
    pub(crate) async fn commit(&self, staged: TempDir, document_id: &str) -> Result<PathBuf> {
        let dest = self.index_dir(document_id);
        let staged_path = staged.keep();

        if tokio::fs::try_exists(&dest).await? {
            let retired = tempfile::Builder::new()
                .prefix(".retired-")
                .tempdir_in(&self.root)?;
            let parked = retired.path().join("index");
            tokio::fs::rename(&dest, &parked).await?;
            if let Err(err) = tokio::fs::rename(&staged_path, &dest).await {
                // Put the previous index back rather than leaving the key
                // empty; the staged data is abandoned.
                let _ = tokio::fs::rename(&parked, &dest).await;
                let _ = tokio::fs::remove_dir_all(&staged_path).await;
                return Err(err.into());
            }
            // `retired` drops here and deletes the replaced index.
        } else {
            tokio::fs::rename(&staged_path, &dest).await?;
        }

        tracing::debug!(document_id, dest = %dest.display(), "committed index");
        Ok(dest)
    }

    /// Deletes the persisted index for `document_id`, if one exists.
    ///
    /// Returns `true` when something was removed.
    pub async fn remove(&self, document_id: &str) -> Result<bool> {
        let dest = self.index_dir(document_id);
        if tokio::fs::try_exists(&dest).await? {
            tokio::fs::remove_dir_all(&dest).await?;
            tracing::debug!(document_id, "removed persisted index");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
