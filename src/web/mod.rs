//! HTTP boundary for Lockbox.
//!
//! Maps requests onto the upload pipeline and the authorization and
//! authentication engines, and their outcomes onto status codes, cookies
//! and JSON bodies.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
pub use state::{AppState, CookieSettings};
