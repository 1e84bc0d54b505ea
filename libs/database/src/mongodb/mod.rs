//! MongoDB connector and query helpers
//!
//! Connection management with startup retries, a ping-based health probe and
//! a [`QueryBuilder`] that turns flat HTTP query parameters into a filter,
//! sort, page window and projection.

mod config;
mod connector;
mod health;
mod query;

pub use config::MongoConfig;
pub use connector::{
    MongoError, client_options, connect, connect_from_config, connect_from_config_with_retry,
};
pub use health::{HealthStatus, check_health, check_health_detailed};
pub use query::{
    DEFAULT_LIMIT, DEFAULT_PAGE, DEFAULT_SORT, FindQuery, MAX_LIMIT, PageMeta, QueryBuilder,
};

// Re-export MongoDB types for convenience
pub use mongodb::{Client, ClientSession, Collection, Database, bson};
