use mongodb::{Client, bson::doc, error::ErrorKind, options::ClientOptions};
use std::time::Duration;
use tracing::{info, instrument};

use super::MongoConfig;
use crate::common::retry_if;

/// Error type for MongoDB connection management
#[derive(Debug, thiserror::Error)]
pub enum MongoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl MongoError {
    /// Whether reconnecting could help; a malformed URL or option never will
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) => true,
            Self::Mongo(e) => !matches!(*e.kind, ErrorKind::InvalidArgument { .. }),
        }
    }
}

/// Driver options derived from a [`MongoConfig`]
pub async fn client_options(config: &MongoConfig) -> Result<ClientOptions, MongoError> {
    let mut options = ClientOptions::parse(&config.url).await?;

    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
    options.server_selection_timeout =
        Some(Duration::from_secs(config.server_selection_timeout_secs));
    options.app_name = config.app_name.clone();

    Ok(options)
}

/// Connect to MongoDB with default pool settings
///
/// # Example
/// ```ignore
/// let client = database::mongodb::connect("mongodb://localhost:27017").await?;
/// ```
pub async fn connect(url: &str) -> Result<Client, MongoError> {
    connect_from_config(&MongoConfig::new(url)).await
}

/// Connect using a MongoConfig and verify the deployment answers a ping
#[instrument(skip(config), fields(database = %config.database))]
pub async fn connect_from_config(config: &MongoConfig) -> Result<Client, MongoError> {
    info!("Attempting to connect to MongoDB");

    let client = Client::with_options(client_options(config).await?)?;

    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| MongoError::ConnectionFailed(e.to_string()))?;

    info!("Successfully connected to MongoDB");
    Ok(client)
}

/// [`connect_from_config`], retried per `config.retry` while the deployment
/// is unreachable
///
/// # Example
/// ```ignore
/// let config = MongoConfig::from_env()?;
/// let client = connect_from_config_with_retry(&config).await?;
/// ```
pub async fn connect_from_config_with_retry(config: &MongoConfig) -> Result<Client, MongoError> {
    retry_if(&config.retry, MongoError::is_transient, || {
        connect_from_config(config)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_options_apply_config() {
        let config = MongoConfig::with_database("mongodb://localhost:27017", "shop")
            .with_pool_size(25, 3)
            .with_app_name("products-api");

        let options = client_options(&config).await.unwrap();
        assert_eq!(options.max_pool_size, Some(25));
        assert_eq!(options.min_pool_size, Some(3));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.app_name.as_deref(), Some("products-api"));
    }

    #[tokio::test]
    async fn test_client_options_reject_bad_url() {
        let config = MongoConfig::new("not-a-mongo-url");
        let err = client_options(&config).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_failed_ping_is_transient() {
        assert!(MongoError::ConnectionFailed("no primary".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_bad_url_is_not_retried() {
        let config = MongoConfig::new("not-a-mongo-url").with_retry(
            crate::common::RetryPolicy::new(
                5,
                Duration::from_secs(60),
                Duration::from_secs(60),
            ),
        );

        // A retry would sleep for a minute
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            connect_from_config_with_retry(&config),
        )
        .await;
        assert!(matches!(result, Ok(Err(_))));
    }

    #[tokio::test]
    #[ignore] // Requires actual MongoDB
    async fn test_connect() {
        let mongo_url = std::env::var("MONGODB_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        assert!(connect(&mongo_url).await.is_ok());
    }
}
