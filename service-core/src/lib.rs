//! service-core: Shared infrastructure for the SMM panel services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod utils;

pub use axum;
pub use secrecy;
pub use serde;
pub use serde_json;
pub use tracing;
pub use validator;
