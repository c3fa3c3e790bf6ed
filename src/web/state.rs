//! Shared application state for request handlers.

use std::sync::Arc;

use chrono::Duration;

use crate::auth::PasswordHasher;
use crate::config::Config;
use crate::content::{FileStorage, UploadLimits};
use crate::db::{ContentRepository, ContentStore, Database, SessionRepository, SessionStore};
use crate::health::HealthCheck;
use crate::{LockboxError, Result};

/// Session cookie attributes.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    /// Max-Age in days.
    pub max_age_days: i64,
    /// Whether to mark the cookie `Secure`.
    pub secure: bool,
}

/// Application state shared across handlers.
pub struct AppState {
    /// File and group records.
    pub contents: Arc<dyn ContentStore>,
    /// Password sessions.
    pub sessions: Arc<dyn SessionStore>,
    /// Uploaded bytes.
    pub storage: FileStorage,
    /// Password hasher.
    pub hasher: PasswordHasher,
    /// Store reachability, consulted before every request.
    pub health: Arc<dyn HealthCheck>,
    /// Per-upload limits.
    pub limits: UploadLimits,
    /// Lifetime of uploaded content, if limited.
    pub max_age: Option<Duration>,
    /// Base URL shareable links are built on (ends with `/`).
    pub public_url: String,
    /// Session cookie attributes.
    pub cookie: CookieSettings,
}

impl AppState {
    /// Create state over explicit stores.
    pub fn new(
        contents: Arc<dyn ContentStore>,
        sessions: Arc<dyn SessionStore>,
        storage: FileStorage,
        health: Arc<dyn HealthCheck>,
        config: &Config,
    ) -> Result<Self> {
        let hasher = PasswordHasher::new(&config.credentials)?;
        let max_age = config
            .storage
            .max_age_secs
            .map(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .ok_or_else(|| {
                        LockboxError::Config(format!("storage.max_age_secs out of range: {secs}"))
                    })
            })
            .transpose()?;

        Ok(Self {
            contents,
            sessions,
            storage,
            hasher,
            health,
            limits: UploadLimits::from(&config.limits),
            max_age,
            public_url: config.server.public_url.clone(),
            cookie: CookieSettings {
                max_age_days: config.session.cookie_max_age_days,
                secure: config.session.secure_cookie,
            },
        })
    }

    /// Create state backed by the SQLite repositories.
    pub fn from_database(
        db: &Database,
        storage: FileStorage,
        health: Arc<dyn HealthCheck>,
        config: &Config,
    ) -> Result<Self> {
        Self::new(
            Arc::new(ContentRepository::new(db.pool().clone())),
            Arc::new(SessionRepository::new(db.pool().clone())),
            storage,
            health,
            config,
        )
    }

    /// Shareable link for a content id.
    pub fn link(&self, id: &str) -> String {
        format!("{}{}", self.public_url, id)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage)
            .field("limits", &self.limits)
            .field("public_url", &self.public_url)
            .finish()
    }
}
