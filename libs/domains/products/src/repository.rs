use async_trait::async_trait;
use database::mongodb::FindQuery;
use mongodb::bson::Document;
use uuid::Uuid;

use crate::error::ProductResult;
use crate::models::{CreateProduct, Product, UpdateProduct};

/// Repository trait for Product persistence
///
/// Single-statement operations run directly against the store. The create
/// and soft-delete flows span several statements and go through a
/// [`ProductTransaction`] obtained from [`begin`](ProductRepository::begin).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Open a session and start a multi-document transaction
    async fn begin(&self) -> ProductResult<Box<dyn ProductTransaction>>;

    /// Get a product by ID, soft-deleted ones included
    async fn find_by_id(&self, id: Uuid) -> ProductResult<Option<Product>>;

    /// One page of products as JSON, shaped by the query's projection
    async fn find_page(&self, query: &FindQuery) -> ProductResult<Vec<serde_json::Value>>;

    /// Count products matching a filter, ignoring pagination
    async fn count(&self, filter: &Document) -> ProductResult<u64>;

    /// Merge `input` into the stored product and return the new version
    async fn update(&self, id: Uuid, input: UpdateProduct) -> ProductResult<Option<Product>>;
}

/// An open multi-document transaction.
///
/// Callers finish every transaction with exactly one of
/// [`commit`](ProductTransaction::commit) or
/// [`abort`](ProductTransaction::abort); dropping it ends the session and the
/// server discards any uncommitted writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductTransaction: Send {
    /// Insert products; returns the ones the store acknowledged
    async fn insert_many(&mut self, inputs: Vec<CreateProduct>) -> ProductResult<Vec<Product>>;

    async fn find_by_id(&mut self, id: Uuid) -> ProductResult<Option<Product>>;

    /// Set `isDeleted`; `None` if nothing matched
    async fn mark_deleted(&mut self, id: Uuid) -> ProductResult<Option<Product>>;

    async fn commit(&mut self) -> ProductResult<()>;

    async fn abort(&mut self) -> ProductResult<()>;
}
