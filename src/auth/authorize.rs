//! Read-path access decision.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::SessionCookie;
use crate::content::Content;
use crate::db::{ContentStore, SessionStore};
use crate::{id, Result};

/// Outcome of a read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The record may be served. Group members need no separate check.
    Granted(Content),
    /// The record is protected and the presented session does not unlock it.
    PasswordRequired,
    /// Malformed, absent or expired id.
    NotFound,
}

/// Decide whether `id` may be read with the presented session.
///
/// Store failures are returned as errors; only a missing session counts as
/// "no credential".
pub async fn authorize(
    contents: &dyn ContentStore,
    sessions: &dyn SessionStore,
    id: &str,
    cookie: Option<&SessionCookie>,
    now: DateTime<Utc>,
) -> Result<Decision> {
    if !id::is_valid(id) {
        return Ok(Decision::NotFound);
    }

    let Some(content) = contents.find_one(id).await? else {
        return Ok(Decision::NotFound);
    };
    if content.is_expired(now) {
        debug!(id, "Requested content has expired");
        return Ok(Decision::NotFound);
    }

    if content.protection.is_none() {
        return Ok(Decision::Granted(content));
    }

    let Some(cookie) = cookie else {
        return Ok(Decision::PasswordRequired);
    };
    let Some(session) = sessions.find_one(&cookie.id).await? else {
        return Ok(Decision::PasswordRequired);
    };

    if session.token == cookie.token && session.has_access(&content) {
        Ok(Decision::Granted(content))
    } else {
        Ok(Decision::PasswordRequired)
    }
}
