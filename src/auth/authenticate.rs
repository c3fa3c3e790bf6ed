//! Password submission: verify, then mint or refresh a session.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{PasswordHasher, Session, SessionCookie};
use crate::content::Content;
use crate::db::{ContentStore, SessionStore};
use crate::{id, Result};

/// Outcome of a password submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Password accepted; the client should now hold this credential.
    Authenticated(SessionCookie),
    /// Password missing or wrong.
    WrongPassword,
    /// Malformed, absent or expired id.
    NotFound,
    /// The target has no password; nothing to unlock.
    Unprotected,
}

/// Verify `password` for `id` and grant the presented (or a new) session access.
///
/// Hashing faults and store failures are returned as errors, never as
/// [`LoginOutcome::WrongPassword`].
pub async fn authenticate(
    contents: &dyn ContentStore,
    sessions: &dyn SessionStore,
    hasher: &PasswordHasher,
    id: &str,
    cookie: Option<&SessionCookie>,
    password: Option<&str>,
    now: DateTime<Utc>,
) -> Result<LoginOutcome> {
    if !id::is_valid(id) {
        return Ok(LoginOutcome::NotFound);
    }

    let Some(target) = contents.find_one(id).await? else {
        return Ok(LoginOutcome::NotFound);
    };
    if target.is_expired(now) {
        return Ok(LoginOutcome::NotFound);
    }

    let Some(protection) = target.protection.as_ref() else {
        return Ok(LoginOutcome::Unprotected);
    };

    let password = match password {
        Some(p) if !p.is_empty() => p,
        _ => return Ok(LoginOutcome::WrongPassword),
    };

    let matches = hasher
        .verify_async(protection.password_hash.clone(), password.to_string())
        .await?;
    if !matches {
        debug!(id, "Wrong password submitted");
        return Ok(LoginOutcome::WrongPassword);
    }

    let session = open_session(contents, sessions, &target, cookie, now).await?;
    Ok(LoginOutcome::Authenticated(session.cookie()))
}

/// Grant a session access to `target` (and every member if it is a group).
///
/// The presented session is reused when it exists and its token is current;
/// otherwise a new session is created. Either way the token is rotated and
/// the result is upserted.
pub async fn open_session(
    contents: &dyn ContentStore,
    sessions: &dyn SessionStore,
    target: &Content,
    cookie: Option<&SessionCookie>,
    now: DateTime<Utc>,
) -> Result<Session> {
    let existing = match cookie {
        Some(cookie) => sessions
            .find_one(&cookie.id)
            .await?
            .filter(|s| s.token == cookie.token),
        None => None,
    };

    let mut session = match existing {
        Some(mut session) => {
            session.rotate(now);
            session
        }
        None => Session::new(now),
    };

    session.grant(target);
    if target.is_group() {
        for member in contents.find_many(target.members()).await? {
            session.grant(&member);
        }
    }

    sessions.upsert(&session).await?;
    info!(session = %session.id, target = %target.id, "Session granted access");

    Ok(session)
}
