//! MongoDB test infrastructure
//!
//! Provides a `TestMongo` helper that starts a single-node replica set, so
//! multi-document transactions work in tests.

use mongodb::bson::doc;
use mongodb::{Client, Database};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::mongo::Mongo;

/// Test MongoDB wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestMongo;
///
/// # async fn example() {
/// let mongo = TestMongo::new().await;
/// let products = mongo.database().collection::<mongodb::bson::Document>("products");
/// # }
/// ```
pub struct TestMongo {
    #[allow(dead_code)]
    container: ContainerAsync<Mongo>,
    client: Client,
    database_name: String,
    pub connection_string: String,
}

impl TestMongo {
    /// Create a new test MongoDB instance
    ///
    /// Uses the MongoDB 7 image configured as replica set `rs`.
    pub async fn new() -> Self {
        let container = Mongo::repl_set()
            .with_tag("7")
            .start()
            .await
            .expect("Failed to start MongoDB container");

        let host_port = container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");

        let connection_string = format!("mongodb://127.0.0.1:{}/?directConnection=true", host_port);

        let client = Client::with_uri_str(&connection_string)
            .await
            .expect("Failed to create MongoDB client");

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .expect("Failed to ping MongoDB");

        tracing::info!(port = host_port, "Test MongoDB ready (mongo 7, replica set)");

        Self {
            container,
            client,
            database_name: "test".to_string(),
            connection_string,
        }
    }

    /// Get a cloned client (useful for passing to repositories)
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn database(&self) -> Database {
        self.client.database(&self.database_name)
    }

    /// Get the connection string for manual client creation
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

// Container is automatically cleaned up when TestMongo is dropped
impl Drop for TestMongo {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test MongoDB container");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Document;

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_mongo_insert_find() {
        let mongo = TestMongo::new().await;
        let collection = mongo.database().collection::<Document>("items");

        collection.insert_one(doc! { "_id": "a", "n": 1 }).await.unwrap();

        let found = collection.find_one(doc! { "_id": "a" }).await.unwrap().unwrap();
        assert_eq!(found.get_i32("n").unwrap(), 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_mongo_supports_transactions() {
        let mongo = TestMongo::new().await;
        let collection = mongo.database().collection::<Document>("items");
        collection.insert_one(doc! { "_id": "seed" }).await.unwrap();

        let mut session = mongo.client().start_session().await.unwrap();
        session.start_transaction().await.unwrap();
        collection
            .insert_one(doc! { "_id": "rolled-back" })
            .session(&mut session)
            .await
            .unwrap();
        session.abort_transaction().await.unwrap();

        let count = collection.count_documents(doc! {}).await.unwrap();
        assert_eq!(count, 1);
    }
}
