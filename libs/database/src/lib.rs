//! Database library providing MongoDB connectors and query utilities
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB connection management, health checks and
//!   the [`mongodb::QueryBuilder`] used by list endpoints
//! - `config` - Configuration support with `core_config::FromEnv`
//! - `all` - All features
//!
//! # Example
//!
//! ```ignore
//! use database::mongodb::{MongoConfig, connect_from_config_with_retry};
//! use core_config::FromEnv;
//!
//! let config = MongoConfig::from_env()?;
//! let client = connect_from_config_with_retry(&config).await?;
//! let db = client.database(config.database());
//! ```

// Always available modules
pub mod common;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::{RetryPolicy, retry_if};
