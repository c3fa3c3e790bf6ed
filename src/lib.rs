//! Lockbox - password-protected file sharing
//!
//! Accepts streamed multipart uploads, stores them under short random ids,
//! and serves them back by link, optionally behind a password unlocked
//! through a cookie session.

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod health;
pub mod id;
pub mod logging;
pub mod web;

pub use auth::{
    authenticate, authorize, open_session, Decision, LoginOutcome, PasswordError, PasswordHasher,
    Session, SessionCookie, SESSION_COOKIE,
};
pub use config::Config;
pub use content::{
    CommittedBatch, Content, FileInfo, FileStorage, Protection, UploadBatch, UploadError,
    UploadLimits,
};
pub use db::{ContentRepository, ContentStore, Database, SessionRepository, SessionStore};
pub use error::{LockboxError, Result};
pub use health::{HealthCheck, StoreMonitor};
pub use web::{create_router, AppState, WebServer};
