//! File storage for Lockbox.
//!
//! Uploaded bytes live flat in one directory, one file per content id:
//! ```text
//! {base_path}/
//! ├── q3Zt_8LkPa2x.pdf
//! ├── 7cW-d1NnYb0R.png
//! └── ...
//! ```
//! Extensions are sanitized by the upload pipeline before they reach this module.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{LockboxError, Result};

/// File storage service for managing uploaded bytes.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Base directory for file storage.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the stored bytes for a content id.
    pub fn path_for(&self, id: &str, extension: &str) -> PathBuf {
        self.base_path.join(format!("{id}{extension}"))
    }

    /// Create a streamed writer for a new file.
    ///
    /// Fails if a file for this id already exists.
    pub async fn create(&self, id: &str, extension: &str) -> Result<PartWriter> {
        let path = self.path_for(id, extension);
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        Ok(PartWriter {
            file: Some(file),
            path,
            written: 0,
            committed: false,
        })
    }

    /// Delete a stored file.
    ///
    /// Returns `true` if the file was deleted, `false` if it didn't exist.
    pub async fn delete(&self, id: &str, extension: &str) -> Result<bool> {
        remove_if_exists(&self.path_for(id, extension)).await
    }

    /// Check if a file exists in storage.
    pub fn exists(&self, id: &str, extension: &str) -> bool {
        self.path_for(id, extension).exists()
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Scoped sink for one uploaded part.
///
/// Dropping a writer that was never [`commit`](Self::commit)ted removes the
/// partial file, so cancellation (client disconnect, dropped future) never
/// leaves bytes behind.
#[derive(Debug)]
pub struct PartWriter {
    file: Option<fs::File>,
    path: PathBuf,
    written: u64,
    committed: bool,
}

impl PartWriter {
    /// Append a chunk.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            LockboxError::Io(io::Error::new(io::ErrorKind::Other, "writer already closed"))
        })?;
        file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Path being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file, keeping it on disk.
    pub async fn commit(mut self) -> Result<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        self.committed = true;
        Ok(self.written)
    }

    /// Close and delete the partial file.
    pub async fn discard(mut self) -> Result<()> {
        // Close the handle before unlinking
        drop(self.file.take());
        self.committed = true;
        remove_if_exists(&self.path).await.map(|_| ())
    }
}

impl Drop for PartWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        drop(self.file.take());
        // Drop cannot await; this is a single unlink on the cancellation path
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed abandoned partial upload"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove abandoned partial upload"
            ),
        }
    }
}
