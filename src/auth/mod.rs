//! Authentication module for Lockbox.
//!
//! This module provides password hashing, the session model, and the two
//! engines that gate content: [`authorize`] on reads and [`authenticate`]
//! on password submission.

mod authenticate;
mod authorize;
mod password;
mod session;

pub use authenticate::{authenticate, open_session, LoginOutcome};
pub use authorize::{authorize, Decision};
pub use password::{PasswordError, PasswordHasher};
pub use session::{Session, SessionCookie, SESSION_COOKIE};
