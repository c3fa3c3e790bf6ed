//! Request handlers.

pub mod content;
pub mod health;
pub mod upload;

pub use content::{get_content, submit_password};
pub use health::health_check;
pub use upload::upload;
