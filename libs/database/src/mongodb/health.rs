use mongodb::{Client, bson::doc};
use std::time::Instant;

/// Outcome of a MongoDB readiness probe
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    /// Driver error text when the ping failed
    pub message: Option<String>,
    pub response_time_ms: u64,
}

/// Ping the deployment through the `admin` database
///
/// # Example
/// ```ignore
/// use database::mongodb::{connect, check_health};
///
/// let client = connect("mongodb://localhost:27017").await?;
/// let healthy = check_health(&client).await;
/// ```
pub async fn check_health(client: &Client) -> bool {
    ping(client).await.is_ok()
}

/// Ping with round-trip timing, used by the `/ready` probe
pub async fn check_health_detailed(client: &Client) -> HealthStatus {
    let start = Instant::now();
    let result = ping(client).await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => HealthStatus {
            healthy: true,
            message: None,
            response_time_ms,
        },
        Err(e) => HealthStatus {
            healthy: false,
            message: Some(e.to_string()),
            response_time_ms,
        },
    }
}

async fn ping(client: &Client) -> Result<(), mongodb::error::Error> {
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires actual MongoDB
    async fn test_check_health() {
        let client = Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        assert!(check_health(&client).await);
    }

    #[tokio::test]
    async fn test_check_health_detailed_unreachable() {
        let client = Client::with_uri_str(
            "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200",
        )
        .await
        .unwrap();

        let status = check_health_detailed(&client).await;
        assert!(!status.healthy);
        assert!(status.message.is_some());
    }
}
