//! portal-core: Shared infrastructure for the merchant portal.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod retry;

pub use axum;
pub use reqwest;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
pub use validator;
