//! Middleware for the HTTP boundary.

pub mod availability;
pub mod cors;
pub mod rate_limit;
pub mod security;
pub mod session;

pub use availability::require_store;
pub use cors::create_cors_layer;
pub use rate_limit::{password_rate_limit, upload_rate_limit, RateLimitState};
pub use security::security_headers;
pub use session::{session_cookie, session_set_cookie, OptionalSession};
