//! Shared content: uploaded files, groups of files, and their storage.
//!
//! This module provides:
//! - The [`Content`] record stored for every uploaded file and every group
//! - Disk storage for uploaded bytes ([`FileStorage`])
//! - The streaming upload pipeline ([`UploadBatch`])

mod storage;
mod upload;

pub use storage::{FileStorage, PartWriter};
pub use upload::{split_filename, CommittedBatch, UploadBatch, UploadError, UploadLimits};

use chrono::{DateTime, Utc};

/// Password protection attached to a content record.
///
/// Every record uploaded under the same password shares one `access_token`,
/// so proving the password once for a group also proves it for its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protection {
    /// Argon2 PHC hash of the password.
    pub password_hash: String,
    /// Opaque token bound to this password at upload time.
    pub access_token: String,
}

/// Metadata of a single stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Display name without extension.
    pub name: String,
    /// Extension including the leading dot, or empty.
    pub extension: String,
    /// MIME type reported (or guessed) at upload.
    pub mime_type: String,
}

impl FileInfo {
    /// Name shown to downloaders (`name + extension`).
    pub fn display_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }
}

/// What a content record addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    /// A single file whose bytes live in storage.
    File(FileInfo),
    /// A bundle of files uploaded together, listed in upload order.
    Group {
        /// Member content ids.
        members: Vec<String>,
    },
}

/// A stored file or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    /// Public id, also the link path.
    pub id: String,
    /// Upload time.
    pub date: DateTime<Utc>,
    /// Absolute expiry, if the deployment limits storage time.
    pub expires_at: Option<DateTime<Utc>>,
    /// Password protection, if any.
    pub protection: Option<Protection>,
    /// File or group payload.
    pub kind: ContentKind,
}

impl Content {
    /// Create an unprotected file record.
    pub fn file(id: impl Into<String>, date: DateTime<Utc>, info: FileInfo) -> Self {
        Self {
            id: id.into(),
            date,
            expires_at: None,
            protection: None,
            kind: ContentKind::File(info),
        }
    }

    /// Create an unprotected group record.
    pub fn group(id: impl Into<String>, date: DateTime<Utc>, members: Vec<String>) -> Self {
        Self {
            id: id.into(),
            date,
            expires_at: None,
            protection: None,
            kind: ContentKind::Group { members },
        }
    }

    /// Set the expiry time.
    pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Set password protection.
    pub fn with_protection(mut self, protection: Protection) -> Self {
        self.protection = Some(protection);
        self
    }

    /// Whether this record is a group.
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ContentKind::Group { .. })
    }

    /// File metadata, `None` for groups.
    pub fn file_info(&self) -> Option<&FileInfo> {
        match &self.kind {
            ContentKind::File(info) => Some(info),
            ContentKind::Group { .. } => None,
        }
    }

    /// Member ids, empty for plain files.
    pub fn members(&self) -> &[String] {
        match &self.kind {
            ContentKind::File(_) => &[],
            ContentKind::Group { members } => members,
        }
    }

    /// Expired content is treated as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Access token a session must hold for this record, if protected.
    pub fn access_token(&self) -> Option<&str> {
        self.protection.as_ref().map(|p| p.access_token.as_str())
    }
}
