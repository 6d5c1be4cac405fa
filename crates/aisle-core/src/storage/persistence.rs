//! Automerge document persistence
//!
//! Handles saving and loading Automerge documents to/from the filesystem.
//! Uses atomic writes (write to temp file, then rename) to prevent corruption.
//!
//! Storage location: `~/.local/share/aisle/` (configurable via `Config`)
//!
//! Files:
//! - `shopping.automerge` - The Automerge binary document
//! - `shopping.db` - SQLite projection (see `projection`)

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::document::ShoppingDocument;
use crate::storage::error::{StorageError, StorageResult};

/// Persistence layer for Automerge documents
///
/// Provides atomic file operations for saving/loading documents.
pub struct AutomergePersistence {
    config: Config,
}

impl AutomergePersistence {
    /// Create a new persistence handler with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Save a document to disk using atomic write
    pub fn save(&self, doc: &mut ShoppingDocument) -> StorageResult<()> {
        let bytes = doc.save();
        atomic_write(&self.config.automerge_path(), &bytes)
    }

    /// Load a document from disk
    ///
    /// Returns `None` if the document file doesn't exist. A file that exists
    /// but can't be parsed is moved aside to `*.corrupt` and reported as
    /// [`StorageError::CorruptDocument`].
    pub fn load(&self) -> StorageResult<Option<ShoppingDocument>> {
        let path = self.config.automerge_path();

        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(|e| StorageError::from_read(e, path.clone()))?;

        match ShoppingDocument::load(&bytes) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                let backup_path = corrupt_backup_path(&path);
                fs::rename(&path, &backup_path)
                    .map_err(|source| StorageError::AtomicWriteFailed {
                        from: path.clone(),
                        to: backup_path.clone(),
                        source,
                    })?;
                tracing::warn!(path = %path.display(), error = %e, "moved corrupt document aside");
                Err(StorageError::CorruptDocument {
                    path,
                    backup_path,
                    details: e.to_string(),
                })
            }
        }
    }

    /// Load an existing document or create a new one
    ///
    /// If a document exists on disk, it is loaded and returned.
    /// Otherwise, a new document is created, saved, and returned.
    pub fn load_or_create(&self) -> StorageResult<ShoppingDocument> {
        if let Some(doc) = self.load()? {
            return Ok(doc);
        }

        let mut doc = ShoppingDocument::new();
        self.save(&mut doc)?;
        tracing::info!(path = %self.config.automerge_path().display(), "created shopping document");
        Ok(doc)
    }
}

/// Read a document that another replica shares with us
///
/// Returns `None` when nothing has been written there yet.
pub async fn read_shared_document(path: &Path) -> StorageResult<Option<ShoppingDocument>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::from_read(e, path.to_path_buf())),
    };

    match ShoppingDocument::load(&bytes) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => Err(StorageError::InvalidSharedDocument {
            path: path.to_path_buf(),
            details: e.to_string(),
        }),
    }
}

/// Atomically replace the shared document with `doc`
pub async fn write_shared_document(path: &Path, doc: &mut ShoppingDocument) -> StorageResult<()> {
    let bytes = doc.save();
    atomic_write_async(path, &bytes).await
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

fn temp_path_for(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = temp_path_for(path);

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path,
        to: path.to_path_buf(),
        source,
    })
}

/// Async twin of [`atomic_write`] for files touched from async code
pub(crate) async fn atomic_write_async(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let temp_path = temp_path_for(path);

    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .await
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|source| StorageError::AtomicWriteFailed {
            from: temp_path,
            to: path.to_path_buf(),
            source,
        })
}
