//! Store interfaces queried by the access-control core.
//!
//! The authorization and authentication engines only see these traits, so
//! they can be exercised against any backend. [`ContentRepository`] and
//! [`SessionRepository`] are the SQLite implementations.
//!
//! [`ContentRepository`]: super::ContentRepository
//! [`SessionRepository`]: super::SessionRepository

use async_trait::async_trait;

use crate::auth::Session;
use crate::content::Content;
use crate::Result;

/// Lookup and batch insertion of file and group records.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Find a record by id.
    async fn find_one(&self, id: &str) -> Result<Option<Content>>;

    /// Find records by id, in the order requested. Missing ids are skipped.
    async fn find_many(&self, ids: &[String]) -> Result<Vec<Content>>;

    /// Insert a batch of records. Either all of them are stored or none is.
    async fn insert_many(&self, records: &[Content]) -> Result<()>;
}

/// Lookup and upsert of password sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Find a session by id.
    async fn find_one(&self, id: &str) -> Result<Option<Session>>;

    /// Create or replace a session.
    ///
    /// Token, activity date and the whole access map are overwritten.
    /// Concurrent upserts of one session resolve last-writer-wins.
    async fn upsert(&self, session: &Session) -> Result<()>;
}
