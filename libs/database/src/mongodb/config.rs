use crate::common::RetryPolicy;
#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_optional, env_parse};
#[cfg(feature = "config")]
use std::time::Duration;

/// MongoDB connection settings
///
/// # Example
///
/// ```ignore
/// use database::mongodb::MongoConfig;
///
/// let config = MongoConfig::with_database("mongodb://localhost:27017/?replicaSet=rs0", "shop")
///     .with_app_name("products-api");
/// ```
#[derive(Clone, Debug)]
pub struct MongoConfig {
    /// Connection string: mongodb://[username:password@]host[:port][/database][?options]
    ///
    /// Multi-document transactions need a replica set or sharded cluster, so
    /// production URLs normally carry `replicaSet=...`.
    pub url: String,

    /// Database name to use
    pub database: String,

    /// Application name reported in server logs
    pub app_name: Option<String>,

    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,

    /// Startup reconnect policy for [`connect_from_config_with_retry`](super::connect_from_config_with_retry)
    pub retry: RetryPolicy,
}

impl MongoConfig {
    /// Config for `url` with the `default` database
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_database(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_pool_size(mut self, max_pool_size: u32, min_pool_size: u32) -> Self {
        self.max_pool_size = max_pool_size;
        self.min_pool_size = min_pool_size;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            database: "default".to_string(),
            app_name: None,
            max_pool_size: 100,
            min_pool_size: 5,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

/// Load MongoConfig from environment variables
///
/// - `MONGODB_URL` or `MONGO_URL` (required)
/// - `MONGODB_DATABASE` or `MONGO_DATABASE` (required)
/// - `MONGODB_APP_NAME` (optional)
/// - `MONGODB_MAX_POOL_SIZE` (default: 100)
/// - `MONGODB_MIN_POOL_SIZE` (default: 5)
/// - `MONGODB_CONNECT_TIMEOUT_SECS` (default: 10)
/// - `MONGODB_SERVER_SELECTION_TIMEOUT_SECS` (default: 30)
/// - `MONGODB_CONNECT_RETRIES` (default: 3)
/// - `MONGODB_RETRY_DELAY_MS` (default: 100)
/// - `MONGODB_RETRY_MAX_DELAY_MS` (default: 5000)
#[cfg(feature = "config")]
impl FromEnv for MongoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let url = env_optional("MONGODB_URL")
            .or_else(|| env_optional("MONGO_URL"))
            .ok_or_else(|| ConfigError::MissingEnvVar("MONGODB_URL or MONGO_URL".to_string()))?;

        let database = env_optional("MONGODB_DATABASE")
            .or_else(|| env_optional("MONGO_DATABASE"))
            .ok_or_else(|| {
                ConfigError::MissingEnvVar("MONGODB_DATABASE or MONGO_DATABASE".to_string())
            })?;

        Ok(Self {
            url,
            database,
            app_name: env_optional("MONGODB_APP_NAME"),
            max_pool_size: env_parse("MONGODB_MAX_POOL_SIZE", defaults.max_pool_size)?,
            min_pool_size: env_parse("MONGODB_MIN_POOL_SIZE", defaults.min_pool_size)?,
            connect_timeout_secs: env_parse(
                "MONGODB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            )?,
            server_selection_timeout_secs: env_parse(
                "MONGODB_SERVER_SELECTION_TIMEOUT_SECS",
                defaults.server_selection_timeout_secs,
            )?,
            retry: RetryPolicy::new(
                env_parse("MONGODB_CONNECT_RETRIES", defaults.retry.max_retries)?,
                Duration::from_millis(env_parse(
                    "MONGODB_RETRY_DELAY_MS",
                    defaults.retry.initial_delay.as_millis() as u64,
                )?),
                Duration::from_millis(env_parse(
                    "MONGODB_RETRY_MAX_DELAY_MS",
                    defaults.retry.max_delay.as_millis() as u64,
                )?),
            ),
        })
    }
}
