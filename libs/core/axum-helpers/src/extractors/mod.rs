//! Custom extractors for Axum handlers.
//!
//! Both reject with [`AppError`](crate::errors::AppError), so malformed input
//! produces the standard error body.

pub mod uuid_path;
pub mod validated_json;

pub use uuid_path::UuidPath;
pub use validated_json::ValidatedJson;
