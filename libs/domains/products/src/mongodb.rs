//! MongoDB implementation of ProductRepository

use async_trait::async_trait;
use chrono::Utc;
use database::mongodb::FindQuery;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    options::{IndexOptions, ReturnDocument},
    Client, ClientSession, Collection, IndexModel,
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::ProductResult;
use crate::models::{format_timestamp, CreateProduct, Product, UpdateProduct};
use crate::repository::{ProductRepository, ProductTransaction};

pub const PRODUCTS_COLLECTION: &str = "products";

/// MongoDB implementation of the ProductRepository
///
/// Transactions need a replica set or sharded deployment.
#[derive(Clone)]
pub struct MongoProductRepository {
    client: Client,
    collection: Collection<Product>,
}

impl MongoProductRepository {
    pub fn new(client: Client, database: &str) -> Self {
        Self::with_collection(client, database, PRODUCTS_COLLECTION)
    }

    /// Create a new MongoProductRepository with a custom collection name
    pub fn with_collection(client: Client, database: &str, collection_name: &str) -> Self {
        let collection = client
            .database(database)
            .collection::<Product>(collection_name);
        Self { client, collection }
    }

    /// Create the indexes used by listing and filtering
    pub async fn init_indexes(&self) -> ProductResult<()> {
        let index = |keys: Document, name: &str| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build()
        };

        let indexes = vec![
            index(doc! { "isDeleted": 1, "createdAt": -1 }, "idx_deleted_created"),
            index(doc! { "category": 1 }, "idx_category"),
            index(doc! { "brand": 1 }, "idx_brand"),
            index(doc! { "price": 1 }, "idx_price"),
        ];

        self.collection.create_indexes(indexes).await?;
        tracing::info!("Product indexes created successfully");
        Ok(())
    }

    /// Get the underlying collection for advanced operations
    pub fn collection(&self) -> &Collection<Product> {
        &self.collection
    }

    /// `$set` document for a partial update.
    ///
    /// Name keys are written as `name.<key>` so unspecified name parts keep
    /// their stored value; every other present field replaces its stored one.
    fn build_update(input: &UpdateProduct) -> Document {
        let mut set = Document::new();

        if let Some(ref name) = input.name {
            for (key, value) in name.present_fields() {
                set.insert(format!("name.{key}"), value);
            }
        }
        if let Some(ref description) = input.description {
            set.insert("description", description);
        }
        if let Some(price) = input.price {
            set.insert("price", price);
        }
        if let Some(stock) = input.stock {
            set.insert("stock", stock);
        }
        if let Some(ref category) = input.category {
            set.insert("category", category);
        }
        if let Some(ref brand) = input.brand {
            set.insert("brand", brand);
        }
        if let Some(ref image_url) = input.image_url {
            set.insert("imageUrl", image_url.clone());
        }
        set.insert("updatedAt", format_timestamp(&Utc::now()));

        doc! { "$set": set }
    }
}

fn id_filter(id: Uuid) -> Document {
    doc! { "_id": id.to_string() }
}

#[async_trait]
impl ProductRepository for MongoProductRepository {
    #[instrument(skip(self))]
    async fn begin(&self) -> ProductResult<Box<dyn ProductTransaction>> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        Ok(Box::new(MongoProductTransaction {
            collection: self.collection.clone(),
            session,
        }))
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> ProductResult<Option<Product>> {
        let product = self.collection.find_one(id_filter(id)).await?;
        Ok(product)
    }

    #[instrument(skip(self, query), fields(page = query.page, limit = query.limit))]
    async fn find_page(&self, query: &FindQuery) -> ProductResult<Vec<serde_json::Value>> {
        let cursor = self
            .collection
            .clone_with_type::<Document>()
            .find(query.filter.clone())
            .sort(query.sort.clone())
            .skip(query.skip())
            .limit(i64::try_from(query.limit).unwrap_or(i64::MAX))
            .projection(query.projection.clone())
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        Ok(documents
            .into_iter()
            .map(|document| Bson::Document(document).into_relaxed_extjson())
            .collect())
    }

    #[instrument(skip(self))]
    async fn count(&self, filter: &Document) -> ProductResult<u64> {
        let count = self.collection.count_documents(filter.clone()).await?;
        Ok(count)
    }

    #[instrument(skip(self, input))]
    async fn update(&self, id: Uuid, input: UpdateProduct) -> ProductResult<Option<Product>> {
        let product = self
            .collection
            .find_one_and_update(id_filter(id), Self::build_update(&input))
            .return_document(ReturnDocument::After)
            .await?;

        if product.is_some() {
            tracing::info!(product_id = %id, "Product updated successfully");
        }
        Ok(product)
    }
}

/// A session with an active transaction on the products collection
pub struct MongoProductTransaction {
    collection: Collection<Product>,
    session: ClientSession,
}

#[async_trait]
impl ProductTransaction for MongoProductTransaction {
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    async fn insert_many(&mut self, inputs: Vec<CreateProduct>) -> ProductResult<Vec<Product>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let products: Vec<Product> = inputs.into_iter().map(Product::new).collect();
        let result = self
            .collection
            .insert_many(&products)
            .session(&mut self.session)
            .await?;

        Ok(products
            .into_iter()
            .enumerate()
            .filter(|(index, _)| result.inserted_ids.contains_key(index))
            .map(|(_, product)| product)
            .collect())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&mut self, id: Uuid) -> ProductResult<Option<Product>> {
        let product = self
            .collection
            .find_one(id_filter(id))
            .session(&mut self.session)
            .await?;
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn mark_deleted(&mut self, id: Uuid) -> ProductResult<Option<Product>> {
        let update = doc! {
            "$set": { "isDeleted": true, "updatedAt": format_timestamp(&Utc::now()) }
        };

        let product = self
            .collection
            .find_one_and_update(id_filter(id), update)
            .return_document(ReturnDocument::After)
            .session(&mut self.session)
            .await?;
        Ok(product)
    }

    async fn commit(&mut self) -> ProductResult<()> {
        self.session.commit_transaction().await?;
        Ok(())
    }

    async fn abort(&mut self) -> ProductResult<()> {
        self.session.abort_transaction().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UpdateProductName;

    fn set_of(update: &Document) -> &Document {
        update.get_document("$set").unwrap()
    }

    #[test]
    fn test_build_update_flattens_name() {
        let input = UpdateProduct {
            name: Some(UpdateProductName {
                first: Some("A".to_string()),
                ..Default::default()
            }),
            price: Some(10.0),
            ..Default::default()
        };

        let update = MongoProductRepository::build_update(&input);
        let set = set_of(&update);
        assert_eq!(set.get_str("name.first").unwrap(), "A");
        assert!(!set.contains_key("name"));
        assert!(!set.contains_key("name.last"));
        assert_eq!(set.get_f64("price").unwrap(), 10.0);
    }

    #[test]
    fn test_build_update_only_touches_present_fields() {
        let update = MongoProductRepository::build_update(&UpdateProduct::default());
        let set = set_of(&update);

        assert_eq!(set.len(), 1);
        assert!(set.contains_key("updatedAt"));
    }

    #[test]
    fn test_build_update_replaces_image_list() {
        let input = UpdateProduct {
            image_url: Some(vec!["https://img/1.png".to_string()]),
            stock: Some(4),
            ..Default::default()
        };

        let update = MongoProductRepository::build_update(&input);
        let set = set_of(&update);
        assert_eq!(set.get_array("imageUrl").unwrap().len(), 1);
        assert_eq!(set.get_i64("stock").unwrap(), 4);
    }

    #[test]
    fn test_id_filter_uses_string_id() {
        let id = Uuid::now_v7();
        assert_eq!(id_filter(id).get_str("_id").unwrap(), id.to_string());
    }
}
