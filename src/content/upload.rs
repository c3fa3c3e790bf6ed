//! Streaming upload pipeline.
//!
//! One [`UploadBatch`] per upload request. Parts are written to disk chunk by
//! chunk while a batch-wide byte counter enforces the size limit, so a client
//! lying about `Content-Length` can never push more than the limit to disk.
//! A batch either [`commit`](UploadBatch::commit)s all of its records in one
//! store call or removes every byte it wrote.

use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use futures::{pin_mut, Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Content, FileInfo, FileStorage, PartWriter, Protection};
use crate::auth::{PasswordError, PasswordHasher};
use crate::config::LimitsConfig;
use crate::db::ContentStore;
use crate::{id, LockboxError};

/// Longest extension (without the dot) kept from an uploaded filename.
const MAX_EXTENSION_LENGTH: usize = 16;

/// Upload pipeline errors.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Declared length is missing, zero or not a number.
    #[error("missing or wrong content-length")]
    InvalidLength,

    /// Declared or streamed size reached the limit.
    #[error("total size limit was reached")]
    SizeLimitExceeded,

    /// More file parts than allowed.
    #[error("the files limit was reached")]
    CountLimitExceeded,

    /// The upload contained no file parts.
    #[error("no files were uploaded")]
    NoFiles,

    /// The incoming part stream failed (malformed multipart, disconnect).
    #[error("upload stream failed: {0}")]
    Stream(String),

    /// Writing to disk failed.
    #[error("storage error: {0}")]
    Storage(LockboxError),

    /// Persisting the batch failed.
    #[error("store error: {0}")]
    Store(LockboxError),

    /// Hashing the upload password failed.
    #[error("credential error: {0}")]
    Credential(#[from] PasswordError),
}

impl UploadError {
    /// Whether the client caused this error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            UploadError::InvalidLength
                | UploadError::SizeLimitExceeded
                | UploadError::CountLimitExceeded
                | UploadError::NoFiles
                | UploadError::Stream(_)
        )
    }
}

/// Per-request upload limits.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Maximum number of file parts.
    pub max_files: usize,
    /// Maximum total bytes across all parts.
    pub size_limit: u64,
}

impl From<&LimitsConfig> for UploadLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_files: config.max_files,
            size_limit: config.size_limit_bytes,
        }
    }
}

/// Result of a committed upload.
#[derive(Debug, Clone)]
pub struct CommittedBatch {
    /// Record to share: the file itself, or the group for multi-file uploads.
    pub target: Content,
    /// Every record persisted, members first, group last.
    pub records: Vec<Content>,
}

impl CommittedBatch {
    /// Whether the batch was uploaded with a password.
    pub fn is_protected(&self) -> bool {
        self.target.protection.is_some()
    }
}

/// Split an uploaded filename into display name and sanitized extension.
///
/// Directory components (either separator) are dropped. The extension keeps
/// its leading dot; one that is empty, too long or contains anything besides
/// ASCII alphanumerics, `-` and `_` is folded back into the name.
pub fn split_filename(filename: &str) -> (String, String) {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    match base.rfind('.') {
        Some(dot) if dot > 0 => {
            let ext = &base[dot + 1..];
            let ext_ok = !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LENGTH
                && ext
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
            if ext_ok {
                (base[..dot].to_string(), base[dot..].to_string())
            } else {
                (base.to_string(), String::new())
            }
        }
        _ => (base.to_string(), String::new()),
    }
}

/// A single upload request in progress.
#[derive(Debug)]
pub struct UploadBatch {
    storage: FileStorage,
    limits: UploadLimits,
    date: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    total: u64,
    files: Vec<Content>,
    rename: bool,
    password: Option<String>,
    finished: bool,
}

impl UploadBatch {
    /// Start a batch, checking the declared request length before any part is read.
    pub fn new(
        content_length: Option<&str>,
        limits: UploadLimits,
        storage: FileStorage,
        now: DateTime<Utc>,
    ) -> Result<Self, UploadError> {
        let declared_length = content_length
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|len| *len > 0)
            .ok_or(UploadError::InvalidLength)?;

        if declared_length > limits.size_limit {
            return Err(UploadError::SizeLimitExceeded);
        }

        Ok(Self {
            storage,
            limits,
            date: now,
            expires_at: None,
            total: 0,
            files: Vec::new(),
            rename: false,
            password: None,
            finished: false,
        })
    }

    /// Give every record in this batch a fixed lifetime.
    ///
    /// A lifetime reaching past the representable range means no expiry.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.expires_at = max_age.and_then(|age| self.date.checked_add_signed(age));
        self
    }

    /// Store subsequent parts under their generated id instead of the original name.
    pub fn set_rename(&mut self, rename: bool) {
        self.rename = rename;
    }

    /// Protect the batch with a password. Empty passwords are ignored.
    pub fn set_password(&mut self, password: impl Into<String>) {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
    }

    /// Bytes received so far across all parts.
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    /// Records for the parts written so far.
    pub fn files(&self) -> &[Content] {
        &self.files
    }

    /// Stream one file part to storage.
    ///
    /// On error the part's partial file is already gone; the caller should
    /// [`abort`](Self::abort) the batch to remove earlier parts.
    pub async fn write_part<S, B, E>(
        &mut self,
        filename: &str,
        mime_type: Option<&str>,
        stream: S,
    ) -> Result<&Content, UploadError>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        if self.files.len() >= self.limits.max_files {
            return Err(UploadError::CountLimitExceeded);
        }

        let id = id::generate();
        let (name, extension) = split_filename(filename);
        let name = if self.rename { id.clone() } else { name };
        let mime_type = mime_type
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(filename)
                    .first_or_octet_stream()
                    .to_string()
            });

        let mut writer = self
            .storage
            .create(&id, &extension)
            .await
            .map_err(UploadError::Storage)?;

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    discard(writer).await;
                    return Err(UploadError::Stream(e.to_string()));
                }
            };
            let chunk = chunk.as_ref();

            self.total += chunk.len() as u64;
            if self.total >= self.limits.size_limit {
                debug!(
                    total = self.total,
                    limit = self.limits.size_limit,
                    "Upload size limit reached mid-stream"
                );
                discard(writer).await;
                return Err(UploadError::SizeLimitExceeded);
            }

            if let Err(e) = writer.write(chunk).await {
                discard(writer).await;
                return Err(UploadError::Storage(e));
            }
        }

        let size = writer.commit().await.map_err(UploadError::Storage)?;
        debug!(id = %id, size, "Stored upload part");

        let record = Content::file(
            id,
            self.date,
            FileInfo {
                name,
                extension,
                mime_type,
            },
        )
        .with_expiry(self.expires_at);
        self.files.push(record);

        Ok(&self.files[self.files.len() - 1])
    }

    /// Delete every file written by this batch.
    ///
    /// Best effort: failures are logged and not retried.
    pub async fn abort(mut self) {
        self.finished = true;
        let files = std::mem::take(&mut self.files);
        for record in &files {
            let extension = record.file_info().map(|f| f.extension.as_str()).unwrap_or("");
            if let Err(e) = self.storage.delete(&record.id, extension).await {
                warn!(id = %record.id, error = %e, "Failed to remove file of aborted upload");
            }
        }
        if !files.is_empty() {
            info!(count = files.len(), "Rolled back aborted upload");
        }
    }

    /// Persist the batch.
    ///
    /// Adds a group record when more than one file was uploaded and stamps
    /// every record (group included) with the same password hash and access
    /// token. On any failure the written files are removed.
    pub async fn commit(
        mut self,
        store: &dyn ContentStore,
        hasher: &PasswordHasher,
    ) -> Result<CommittedBatch, UploadError> {
        if self.files.is_empty() {
            self.finished = true;
            return Err(UploadError::NoFiles);
        }

        let mut records = self.files.clone();
        let is_group = records.len() > 1;
        if is_group {
            let members = records.iter().map(|r| r.id.clone()).collect();
            records.push(Content::group(id::generate(), self.date, members).with_expiry(self.expires_at));
        }

        if let Some(password) = self.password.take() {
            let password_hash = match hasher.hash_async(password).await {
                Ok(hash) => hash,
                Err(e) => {
                    self.abort().await;
                    return Err(UploadError::Credential(e));
                }
            };
            let protection = Protection {
                password_hash,
                access_token: id::generate(),
            };
            for record in &mut records {
                record.protection = Some(protection.clone());
            }
        }

        if let Err(e) = store.insert_many(&records).await {
            self.abort().await;
            return Err(UploadError::Store(e));
        }

        self.finished = true;
        let target = if is_group {
            records[records.len() - 1].clone()
        } else {
            records[0].clone()
        };
        info!(
            id = %target.id,
            files = self.files.len(),
            bytes = self.total,
            protected = target.protection.is_some(),
            "Upload committed"
        );

        Ok(CommittedBatch { target, records })
    }
}

impl Drop for UploadBatch {
    fn drop(&mut self) {
        if self.finished || self.files.is_empty() {
            return;
        }
        // Drop cannot await; unlinks are few and only happen on cancellation
        for record in &self.files {
            let extension = record.file_info().map(|f| f.extension.as_str()).unwrap_or("");
            let path = self.storage.path_for(&record.id, extension);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file of abandoned upload"),
            }
        }
        info!(count = self.files.len(), "Removed files of abandoned upload");
    }
}

async fn discard(writer: PartWriter) {
    let path = writer.path().to_path_buf();
    if let Err(e) = writer.discard().await {
        warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ContentRepository, Database};
    use futures::stream;
    use std::convert::Infallible;
    use tempfile::TempDir;

    fn limits() -> UploadLimits {
        UploadLimits {
            max_files: 3,
            size_limit: 1024,
        }
    }

    fn setup() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path()).unwrap();
        (temp_dir, storage)
    }

    fn body(chunks: &[&'static [u8]]) -> impl Stream<Item = Result<&'static [u8], Infallible>> {
        stream::iter(chunks.to_vec().into_iter().map(Ok))
    }

    fn stored_count(storage: &FileStorage) -> usize {
        std::fs::read_dir(storage.base_path()).unwrap().count()
    }

    #[test]
    fn test_split_filename() {
        assert_eq!(split_filename("report.pdf"), ("report".into(), ".pdf".into()));
        assert_eq!(split_filename("archive.tar.gz"), ("archive.tar".into(), ".gz".into()));
        assert_eq!(split_filename("Makefile"), ("Makefile".into(), "".into()));
        assert_eq!(split_filename(".bashrc"), (".bashrc".into(), "".into()));
        assert_eq!(split_filename("file."), ("file.".into(), "".into()));
        assert_eq!(split_filename("../../etc/passwd"), ("passwd".into(), "".into()));
        assert_eq!(split_filename("C:\\Users\\me\\photo.JPG"), ("photo".into(), ".JPG".into()));
        assert_eq!(split_filename("weird.p h p"), ("weird.p h p".into(), "".into()));
        assert_eq!(split_filename("日本語.txt"), ("日本語".into(), ".txt".into()));
    }

    #[test]
    fn test_new_rejects_bad_length() {
        let (_dir, storage) = setup();
        let now = Utc::now();

        for value in [None, Some(""), Some("abc"), Some("0"), Some("-5")] {
            let result = UploadBatch::new(value, limits(), storage.clone(), now);
            assert!(matches!(result, Err(UploadError::InvalidLength)), "{value:?}");
        }
    }

    #[test]
    fn test_new_rejects_oversized_declaration() {
        let (_dir, storage) = setup();
        let result = UploadBatch::new(Some("1025"), limits(), storage, Utc::now());
        assert!(matches!(result, Err(UploadError::SizeLimitExceeded)));
    }

    #[tokio::test]
    async fn test_write_part_streams_to_disk() {
        let (_dir, storage) = setup();
        let mut batch = UploadBatch::new(Some("100"), limits(), storage.clone(), Utc::now()).unwrap();

        let record = batch
            .write_part("notes.txt", Some("text/plain"), body(&[b"hello ", b"world"]))
            .await
            .unwrap()
            .clone();

        let info = record.file_info().unwrap();
        assert_eq!(info.name, "notes");
        assert_eq!(info.extension, ".txt");
        assert_eq!(info.mime_type, "text/plain");
        assert_eq!(batch.total_bytes(), 11);

        let content = std::fs::read(storage.path_for(&record.id, ".txt")).unwrap();
        assert_eq!(content, b"hello world");
        batch.abort().await;
    }

    #[tokio::test]
    async fn test_rename_uses_generated_id() {
        let (_dir, storage) = setup();
        let mut batch = UploadBatch::new(Some("100"), limits(), storage, Utc::now()).unwrap();
        batch.set_rename(true);

        let record = batch
            .write_part("holiday.png", None, body(&[b"png"]))
            .await
            .unwrap()
            .clone();

        let info = record.file_info().unwrap();
        assert_eq!(info.name, record.id);
        assert_eq!(info.extension, ".png");
        assert_eq!(info.mime_type, "image/png");
        batch.abort().await;
    }

    #[tokio::test]
    async fn test_count_limit() {
        let (_dir, storage) = setup();
        let mut batch = UploadBatch::new(Some("100"), limits(), storage.clone(), Utc::now()).unwrap();

        for i in 0..3 {
            batch
                .write_part(&format!("{i}.txt"), None, body(&[b"x"]))
                .await
                .unwrap();
        }
        let result = batch.write_part("3.txt", None, body(&[b"x"])).await;
        assert!(matches!(result, Err(UploadError::CountLimitExceeded)));
        assert_eq!(stored_count(&storage), 3);

        batch.abort().await;
        assert_eq!(stored_count(&storage), 0);
    }

    #[tokio::test]
    async fn test_size_limit_is_batch_wide_and_mid_stream() {
        let (_dir, storage) = setup();
        let mut batch = UploadBatch::new(Some("10"), limits(), storage.clone(), Utc::now()).unwrap();

        static HALF: [u8; 600] = [7; 600];
        batch
            .write_part("a.bin", None, body(&[&HALF]))
            .await
            .unwrap();

        // Second part crosses the limit on its first chunk
        let result = batch
            .write_part("b.bin", None, body(&[&HALF, &HALF]))
            .await;
        assert!(matches!(result, Err(UploadError::SizeLimitExceeded)));
        assert_eq!(stored_count(&storage), 1);

        batch.abort().await;
        assert_eq!(stored_count(&storage), 0);
    }

    #[tokio::test]
    async fn test_size_limit_reached_exactly() {
        let (_dir, storage) = setup();
        let mut batch = UploadBatch::new(Some("10"), limits(), storage.clone(), Utc::now()).unwrap();

        static EXACT: [u8; 1024] = [1; 1024];
        let result = batch.write_part("a.bin", None, body(&[&EXACT])).await;
        assert!(matches!(result, Err(UploadError::SizeLimitExceeded)));
        assert_eq!(stored_count(&storage), 0);
    }

    #[tokio::test]
    async fn test_stream_error_removes_partial_file() {
        let (_dir, storage) = setup();
        let mut batch = UploadBatch::new(Some("10"), limits(), storage.clone(), Utc::now()).unwrap();

        let failing = stream::iter(vec![Ok::<&[u8], &str>(b"abc"), Err("connection reset")]);
        let result = batch.write_part("a.bin", None, failing).await;

        match result {
            Err(UploadError::Stream(msg)) => assert!(msg.contains("connection reset")),
            other => panic!("expected stream error, got {other:?}"),
        }
        assert_eq!(stored_count(&storage), 0);
    }

    #[tokio::test]
    async fn test_dropped_batch_removes_files() {
        let (_dir, storage) = setup();
        {
            let mut batch =
                UploadBatch::new(Some("10"), limits(), storage.clone(), Utc::now()).unwrap();
            batch.write_part("a.txt", None, body(&[b"a"])).await.unwrap();
            batch.write_part("b.txt", None, body(&[b"b"])).await.unwrap();
            assert_eq!(stored_count(&storage), 2);
        }
        assert_eq!(stored_count(&storage), 0);
    }

    #[tokio::test]
    async fn test_commit_single_file() {
        let (_dir, storage) = setup();
        let db = Database::open_in_memory().await.unwrap();
        let store = ContentRepository::new(db.pool().clone());
        let hasher = PasswordHasher::minimal();

        let mut batch = UploadBatch::new(Some("10"), limits(), storage.clone(), Utc::now()).unwrap();
        batch.write_part("a.txt", None, body(&[b"a"])).await.unwrap();

        let committed = batch.commit(&store, &hasher).await.unwrap();
        assert!(!committed.target.is_group());
        assert!(!committed.is_protected());
        assert_eq!(committed.records.len(), 1);

        let found = store.find_one(&committed.target.id).await.unwrap().unwrap();
        assert_eq!(found.file_info(), committed.target.file_info());
        assert_eq!(stored_count(&storage), 1);
    }

    #[tokio::test]
    async fn test_commit_group_with_password() {
        let (_dir, storage) = setup();
        let db = Database::open_in_memory().await.unwrap();
        let store = ContentRepository::new(db.pool().clone());
        let hasher = PasswordHasher::minimal();

        let mut batch = UploadBatch::new(Some("10"), limits(), storage, Utc::now()).unwrap();
        batch.set_password("secret");
        batch.write_part("a.txt", None, body(&[b"a"])).await.unwrap();
        batch.write_part("b.txt", None, body(&[b"b"])).await.unwrap();

        let committed = batch.commit(&store, &hasher).await.unwrap();
        let group = &committed.target;
        assert!(group.is_group());
        assert_eq!(group.members().len(), 2);
        assert_eq!(committed.records.len(), 3);

        let protection = group.protection.as_ref().unwrap();
        assert!(hasher.verify(&protection.password_hash, "secret").unwrap());
        for record in &committed.records {
            assert_eq!(record.protection.as_ref(), Some(protection));
        }
    }

    #[tokio::test]
    async fn test_commit_without_files() {
        let (_dir, storage) = setup();
        let db = Database::open_in_memory().await.unwrap();
        let store = ContentRepository::new(db.pool().clone());

        let batch = UploadBatch::new(Some("10"), limits(), storage, Utc::now()).unwrap();
        let result = batch.commit(&store, &PasswordHasher::minimal()).await;
        assert!(matches!(result, Err(UploadError::NoFiles)));
    }

    #[tokio::test]
    async fn test_commit_store_failure_rolls_back() {
        let (_dir, storage) = setup();
        let db = Database::open_in_memory().await.unwrap();
        let store = ContentRepository::new(db.pool().clone());
        db.close().await;

        let mut batch = UploadBatch::new(Some("10"), limits(), storage.clone(), Utc::now()).unwrap();
        batch.write_part("a.txt", None, body(&[b"a"])).await.unwrap();

        let result = batch.commit(&store, &PasswordHasher::minimal()).await;
        assert!(matches!(result, Err(UploadError::Store(_))));
        assert_eq!(stored_count(&storage), 0);
    }

    #[tokio::test]
    async fn test_max_age_sets_expiry() {
        let (_dir, storage) = setup();
        let now = Utc::now();
        let mut batch = UploadBatch::new(Some("10"), limits(), storage, now)
            .unwrap()
            .with_max_age(Some(Duration::hours(1)));

        let record = batch
            .write_part("a.txt", None, body(&[b"a"]))
            .await
            .unwrap()
            .clone();
        assert_eq!(record.expires_at, Some(now + Duration::hours(1)));
        batch.abort().await;
    }

    #[tokio::test]
    async fn test_out_of_range_max_age_means_no_expiry() {
        let (_dir, storage) = setup();
        let mut batch = UploadBatch::new(Some("10"), limits(), storage, Utc::now())
            .unwrap()
            .with_max_age(Some(Duration::days(1_000_000_000)));

        let record = batch
            .write_part("a.txt", None, body(&[b"a"]))
            .await
            .unwrap()
            .clone();
        assert_eq!(record.expires_at, None);
        batch.abort().await;
    }

    #[tokio::test]
    async fn test_concurrent_batches_are_independent() {
        let (_dir, storage) = setup();
        let now = Utc::now();

        static CHUNK: [u8; 200] = [9; 200];
        let run = |storage: FileStorage| async move {
            let mut batch = UploadBatch::new(Some("10"), limits(), storage, now).unwrap();
            for i in 0..2 {
                let chunks = stream::iter((0..2).map(|_| Ok::<_, Infallible>(&CHUNK[..])));
                batch.write_part(&format!("{i}.bin"), None, chunks).await.unwrap();
                tokio::task::yield_now().await;
            }
            let total = batch.total_bytes();
            let ids: Vec<String> = batch.files().iter().map(|f| f.id.clone()).collect();
            batch.abort().await;
            (total, ids)
        };

        // Each batch stays under its own limit even though together they exceed it
        let ((total_a, ids_a), (total_b, ids_b)) =
            tokio::join!(run(storage.clone()), run(storage.clone()));
        assert_eq!(total_a, 800);
        assert_eq!(total_b, 800);
        assert!(ids_a.iter().all(|id| !ids_b.contains(id)));
    }
}
