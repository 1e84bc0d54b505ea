//! Utilities shared by the database connectors

pub mod retry;

pub use retry::{RetryPolicy, retry_if};
