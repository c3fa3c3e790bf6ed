//! Password sessions and the cookie that carries them.
//!
//! A session ties a rotating token to the set of content ids whose password
//! the holder has proven. The client keeps `"<id>/<token>"` in the
//! [`SESSION_COOKIE`] cookie; the server keeps the grants.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::content::Content;
use crate::id;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Server-side session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session id.
    pub id: String,
    /// Current token. Rotates on every successful password submission.
    pub token: String,
    /// Last activity.
    pub date: DateTime<Utc>,
    /// Content id -> access token proven for it.
    pub access: HashMap<String, String>,
}

impl Session {
    /// Start an empty session with a fresh id and token.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: id::generate(),
            token: id::generate(),
            date: now,
            access: HashMap::new(),
        }
    }

    /// Issue a new token, invalidating every copy of the old one.
    pub fn rotate(&mut self, now: DateTime<Utc>) {
        self.token = id::generate();
        self.date = now;
    }

    /// Record that the holder knows the password protecting `content`.
    ///
    /// Unprotected content needs no grant and is ignored.
    pub fn grant(&mut self, content: &Content) {
        if let Some(token) = content.access_token() {
            self.access.insert(content.id.clone(), token.to_string());
        }
    }

    /// Whether this session holds a grant matching `content`'s current access token.
    pub fn has_access(&self, content: &Content) -> bool {
        match content.access_token() {
            Some(token) => self.access.get(&content.id).is_some_and(|t| t == token),
            None => false,
        }
    }

    /// Cookie credential for the current token.
    pub fn cookie(&self) -> SessionCookie {
        SessionCookie {
            id: self.id.clone(),
            token: self.token.clone(),
        }
    }
}

/// Session credential presented by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Session id.
    pub id: String,
    /// Token the client believes is current.
    pub token: String,
}

impl SessionCookie {
    /// Parse a cookie value of the form `"<id>/<token>"`.
    ///
    /// Splits on the first `/`; both halves must be well-formed ids. Any
    /// other shape yields `None`, the same as presenting no cookie.
    pub fn parse(value: &str) -> Option<Self> {
        let (id, token) = value.split_once('/')?;
        if !id::is_valid(id) || !id::is_valid(token) {
            return None;
        }
        Some(Self {
            id: id.to_string(),
            token: token.to_string(),
        })
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.token)
    }
}
