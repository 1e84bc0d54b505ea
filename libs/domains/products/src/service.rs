//! Product Service - Business logic layer

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use database::mongodb::QueryBuilder;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ProductError, ProductResult};
use crate::media::{image_name, MediaUploader, UploadedFile};
use crate::models::{
    CreateProduct, Product, ProductPage, UpdateProduct, PRODUCT_SEARCHABLE_FIELDS,
};
use crate::repository::{ProductRepository, ProductTransaction};

/// Product service providing business logic operations
///
/// Create and soft-delete run inside a store transaction that is committed on
/// success and aborted on every error path, a failed commit included. The
/// error that caused the abort is returned unchanged.
pub struct ProductService<R: ProductRepository, U: MediaUploader> {
    repository: Arc<R>,
    uploader: Arc<U>,
}

impl<R: ProductRepository, U: MediaUploader> ProductService<R, U> {
    pub fn new(repository: R, uploader: U) -> Self {
        Self {
            repository: Arc::new(repository),
            uploader: Arc::new(uploader),
        }
    }

    /// Upload `files`, then insert the product with their URLs appended to
    /// `input.image_url`.
    ///
    /// Returns the inserted products, which is a single-element list.
    #[instrument(skip(self, files, input), fields(product_name = %input.name.first, image_count = files.len()))]
    pub async fn create_product(
        &self,
        files: Vec<UploadedFile>,
        input: CreateProduct,
    ) -> ProductResult<Vec<Product>> {
        input.validate()?;

        let mut tx = self.repository.begin().await?;
        let mut uploaded = Vec::with_capacity(files.len());

        let created = self
            .create_in(tx.as_mut(), &files, input, &mut uploaded)
            .await;
        let outcome = match created {
            Ok(products) => tx.commit().await.map(|()| products),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(products) => {
                for product in &products {
                    tracing::info!(product_id = %product.id, "Product created successfully");
                }
                Ok(products)
            }
            Err(err) => {
                abort(tx.as_mut(), &err).await;
                if !uploaded.is_empty() {
                    tracing::warn!(
                        orphaned_images = ?uploaded,
                        "Uploaded images are not referenced by any product"
                    );
                }
                Err(err)
            }
        }
    }

    async fn create_in(
        &self,
        tx: &mut dyn ProductTransaction,
        files: &[UploadedFile],
        mut input: CreateProduct,
        uploaded: &mut Vec<String>,
    ) -> ProductResult<Vec<Product>> {
        let product_name = input.name.full();
        let now = Utc::now();

        for (index, file) in files.iter().enumerate() {
            let name = image_name(&product_name, now, index);
            let image = self.uploader.upload(&name, &file.path).await?;
            uploaded.push(image.secure_url);
        }

        input
            .image_url
            .get_or_insert_with(Vec::new)
            .extend(uploaded.iter().cloned());

        let products = tx.insert_many(vec![input]).await?;
        if products.is_empty() {
            return Err(ProductError::BadRequest("Failed to create Product".to_string()));
        }
        Ok(products)
    }

    /// Search, filter, sort, paginate and project products from raw query
    /// parameters
    #[instrument(skip(self))]
    pub async fn list_products(&self, params: HashMap<String, String>) -> ProductResult<ProductPage> {
        let query = QueryBuilder::new(params)
            .search(&PRODUCT_SEARCHABLE_FIELDS)
            .filter()
            .sort()
            .paginate()
            .fields()
            .build();

        let (result, total) = tokio::try_join!(
            self.repository.find_page(&query),
            self.repository.count(&query.filter)
        )?;

        Ok(ProductPage {
            meta: query.meta(total),
            result,
        })
    }

    /// Get a product by ID, including soft-deleted ones
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> ProductResult<Product> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(ProductError::NotFound(id))
    }

    /// Merge a partial update into an existing product
    #[instrument(skip(self, input))]
    pub async fn update_product(&self, id: Uuid, input: UpdateProduct) -> ProductResult<Product> {
        input.validate()?;

        self.repository
            .update(id, input)
            .await?
            .ok_or(ProductError::NotFound(id))
    }

    /// Mark a product deleted and return its new state
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> ProductResult<Product> {
        let mut tx = self.repository.begin().await?;

        let deleted = delete_in(tx.as_mut(), id).await;
        let outcome = match deleted {
            Ok(product) => tx.commit().await.map(|()| product),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(product) => {
                tracing::info!(product_id = %id, "Product soft-deleted");
                Ok(product)
            }
            Err(err) => {
                abort(tx.as_mut(), &err).await;
                Err(err)
            }
        }
    }
}

async fn delete_in(tx: &mut dyn ProductTransaction, id: Uuid) -> ProductResult<Product> {
    let existing = tx
        .find_by_id(id)
        .await?
        .ok_or(ProductError::NotFound(id))?;

    if existing.is_deleted {
        return Err(ProductError::AlreadyDeleted(id));
    }

    tx.mark_deleted(id)
        .await?
        .ok_or_else(|| ProductError::BadRequest("Failed to delete Product".to_string()))
}

async fn abort(tx: &mut dyn ProductTransaction, reason: &ProductError) {
    tracing::warn!(error = %reason, "Aborting transaction");
    if let Err(e) = tx.abort().await {
        tracing::error!(error = %e, "Failed to abort transaction");
    }
}

impl<R: ProductRepository, U: MediaUploader> Clone for ProductService<R, U> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            uploader: Arc::clone(&self.uploader),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MockMediaUploader, UploadedImage};
    use crate::models::{ProductName, UpdateProductName};
    use crate::repository::{MockProductRepository, MockProductTransaction};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use serde_json::json;
    use std::path::PathBuf;

    fn create_input(image_url: Option<Vec<&str>>) -> CreateProduct {
        CreateProduct {
            name: ProductName {
                first: "Trail".to_string(),
                second: None,
                last: Some("Runner".to_string()),
            },
            description: None,
            price: 89.5,
            stock: 3,
            category: Some("shoes".to_string()),
            brand: None,
            image_url: image_url.map(|urls| urls.into_iter().map(String::from).collect()),
        }
    }

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            path: PathBuf::from(format!("/tmp/{name}")),
            file_name: Some(name.to_string()),
            content_type: Some("image/png".to_string()),
        }
    }

    fn stored(input: CreateProduct) -> Product {
        Product::new(input)
    }

    fn with_transaction(repo: &mut MockProductRepository, tx: MockProductTransaction) {
        repo.expect_begin()
            .times(1)
            .return_once(move || Ok(Box::new(tx)));
    }

    fn uploader_returning(urls: &'static [&'static str]) -> MockMediaUploader {
        let mut uploader = MockMediaUploader::new();
        let mut seq = Sequence::new();
        for url in urls {
            uploader
                .expect_upload()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |name, _| {
                    Ok(UploadedImage {
                        secure_url: url.to_string(),
                        public_id: name.to_string(),
                    })
                });
        }
        uploader
    }

    #[tokio::test]
    async fn test_create_appends_uploads_after_existing_urls() {
        let mut tx = MockProductTransaction::new();
        tx.expect_insert_many()
            .times(1)
            .withf(|inputs| {
                inputs.len() == 1
                    && inputs[0].image_url
                        == Some(vec![
                            "https://img/existing.png".to_string(),
                            "https://img/1.png".to_string(),
                            "https://img/2.png".to_string(),
                        ])
            })
            .returning(|inputs| Ok(inputs.into_iter().map(stored).collect()));
        tx.expect_commit().times(1).returning(|| Ok(()));
        tx.expect_abort().never();

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);
        let uploader = uploader_returning(&["https://img/1.png", "https://img/2.png"]);

        let service = ProductService::new(repo, uploader);
        let created = service
            .create_product(
                vec![file("a.png"), file("b.png")],
                create_input(Some(vec!["https://img/existing.png"])),
            )
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].image_url.len(), 3);
        assert_eq!(created[0].image_url[0], "https://img/existing.png");
        assert_eq!(created[0].image_url[2], "https://img/2.png");
    }

    #[tokio::test]
    async fn test_create_without_files_normalizes_image_list() {
        let mut tx = MockProductTransaction::new();
        tx.expect_insert_many()
            .withf(|inputs| inputs[0].image_url == Some(Vec::new()))
            .returning(|inputs| Ok(inputs.into_iter().map(stored).collect()));
        tx.expect_commit().times(1).returning(|| Ok(()));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);
        let mut uploader = MockMediaUploader::new();
        uploader.expect_upload().never();

        let service = ProductService::new(repo, uploader);
        let created = service
            .create_product(Vec::new(), create_input(None))
            .await
            .unwrap();
        assert!(created[0].image_url.is_empty());
    }

    #[tokio::test]
    async fn test_create_upload_failure_aborts_without_insert() {
        let mut tx = MockProductTransaction::new();
        tx.expect_insert_many().never();
        tx.expect_commit().never();
        tx.expect_abort().times(1).returning(|| Ok(()));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);

        let mut uploader = MockMediaUploader::new();
        let mut seq = Sequence::new();
        uploader
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name, _| {
                Ok(UploadedImage {
                    secure_url: "https://img/1.png".to_string(),
                    public_id: name.to_string(),
                })
            });
        uploader
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ProductError::Upload("image host responded 502".to_string())));

        let service = ProductService::new(repo, uploader);
        let err = service
            .create_product(vec![file("a.png"), file("b.png")], create_input(None))
            .await
            .unwrap_err();

        assert!(matches!(err, ProductError::Upload(_)));
    }

    #[tokio::test]
    async fn test_create_with_no_inserted_record_is_bad_request() {
        let mut tx = MockProductTransaction::new();
        tx.expect_insert_many().returning(|_| Ok(Vec::new()));
        tx.expect_commit().never();
        tx.expect_abort().times(1).returning(|| Ok(()));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);

        let service = ProductService::new(repo, MockMediaUploader::new());
        let err = service
            .create_product(Vec::new(), create_input(None))
            .await
            .unwrap_err();

        assert!(matches!(err, ProductError::BadRequest(ref msg) if msg == "Failed to create Product"));
    }

    #[tokio::test]
    async fn test_create_keeps_store_error_kind() {
        let mut tx = MockProductTransaction::new();
        tx.expect_insert_many()
            .returning(|_| Err(ProductError::Conflict("WriteConflict".to_string())));
        tx.expect_abort().times(1).returning(|| Ok(()));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);

        let service = ProductService::new(repo, MockMediaUploader::new());
        let err = service
            .create_product(Vec::new(), create_input(None))
            .await
            .unwrap_err();

        assert!(matches!(err, ProductError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_failed_commit_aborts() {
        let mut tx = MockProductTransaction::new();
        tx.expect_insert_many()
            .times(1)
            .returning(|inputs| Ok(inputs.into_iter().map(stored).collect()));
        tx.expect_commit()
            .times(1)
            .returning(|| Err(ProductError::Conflict("WriteConflict".to_string())));
        tx.expect_abort().times(1).returning(|| Ok(()));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);
        let uploader = uploader_returning(&["https://img/1.png"]);

        let service = ProductService::new(repo, uploader);
        let err = service
            .create_product(vec![file("a.png")], create_input(None))
            .await
            .unwrap_err();

        assert!(matches!(err, ProductError::Conflict(ref msg) if msg == "WriteConflict"));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input_before_transaction() {
        let mut repo = MockProductRepository::new();
        repo.expect_begin().never();

        let mut input = create_input(None);
        input.price = -1.0;

        let service = ProductService::new(repo, MockMediaUploader::new());
        let err = service.create_product(Vec::new(), input).await.unwrap_err();
        assert!(matches!(err, ProductError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_builds_meta_from_unpaginated_count() {
        let mut repo = MockProductRepository::new();
        repo.expect_find_page()
            .withf(|query| {
                query.page == 2
                    && query.limit == 2
                    && query.skip() == 2
                    && query.filter.get_str("category").ok() == Some("shoes")
            })
            .returning(|_| Ok(vec![json!({ "_id": "a" }), json!({ "_id": "b" })]));
        repo.expect_count()
            .withf(|filter| filter.get_str("category").ok() == Some("shoes") && filter.len() == 1)
            .returning(|_| Ok(5));

        let service = ProductService::new(repo, MockMediaUploader::new());
        let params = HashMap::from([
            ("category".to_string(), "shoes".to_string()),
            ("page".to_string(), "2".to_string()),
            ("limit".to_string(), "2".to_string()),
        ]);
        let page = service.list_products(params).await.unwrap();

        assert_eq!(page.meta.total, 5);
        assert_eq!(page.meta.total_page, 3);
        assert!(page.result.len() as u64 <= page.meta.limit);
    }

    #[tokio::test]
    async fn test_list_search_covers_product_fields() {
        let mut repo = MockProductRepository::new();
        repo.expect_find_page()
            .withf(|query| {
                query
                    .filter
                    .get_array("$or")
                    .map(|clauses| clauses.len() == PRODUCT_SEARCHABLE_FIELDS.len())
                    .unwrap_or(false)
            })
            .returning(|_| Ok(Vec::new()));
        repo.expect_count().returning(|_| Ok(0));

        let service = ProductService::new(repo, MockMediaUploader::new());
        let params = HashMap::from([("searchTerm".to_string(), "trail".to_string())]);
        let page = service.list_products(params).await.unwrap();

        assert_eq!(page.meta.total, 0);
        assert_eq!(page.meta.page, 1);
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let id = Uuid::now_v7();
        let mut repo = MockProductRepository::new();
        repo.expect_find_by_id()
            .with(eq(id))
            .returning(|_| Ok(None));

        let service = ProductService::new(repo, MockMediaUploader::new());
        let err = service.get_product(id).await.unwrap_err();
        assert_eq!(err.to_string(), "Product not found!");
    }

    #[tokio::test]
    async fn test_get_product_returns_soft_deleted() {
        let mut product = stored(create_input(None));
        product.is_deleted = true;
        let id = product.id;

        let mut repo = MockProductRepository::new();
        repo.expect_find_by_id()
            .with(eq(id))
            .return_once(move |_| Ok(Some(product)));

        let service = ProductService::new(repo, MockMediaUploader::new());
        let found = service.get_product(id).await.unwrap();
        assert!(found.is_deleted);
    }

    #[tokio::test]
    async fn test_update_missing_product_is_not_found() {
        let id = Uuid::now_v7();
        let mut repo = MockProductRepository::new();
        repo.expect_update().returning(|_, _| Ok(None));

        let service = ProductService::new(repo, MockMediaUploader::new());
        let update = UpdateProduct {
            price: Some(10.0),
            ..Default::default()
        };
        let err = service.update_product(id, update).await.unwrap_err();
        assert!(matches!(err, ProductError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn test_update_passes_partial_name() {
        let product = stored(create_input(None));
        let id = product.id;

        let mut repo = MockProductRepository::new();
        repo.expect_update()
            .withf(move |update_id, update| {
                *update_id == id
                    && update.name.as_ref().and_then(|n| n.first.as_deref()) == Some("A")
                    && update.name.as_ref().and_then(|n| n.last.as_deref()).is_none()
            })
            .return_once(move |_, _| Ok(Some(product)));

        let service = ProductService::new(repo, MockMediaUploader::new());
        let update = UpdateProduct {
            name: Some(UpdateProductName {
                first: Some("A".to_string()),
                ..Default::default()
            }),
            price: Some(10.0),
            ..Default::default()
        };
        assert!(service.update_product(id, update).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_rejects_negative_price() {
        let mut repo = MockProductRepository::new();
        repo.expect_update().never();

        let service = ProductService::new(repo, MockMediaUploader::new());
        let update = UpdateProduct {
            price: Some(-5.0),
            ..Default::default()
        };
        let err = service
            .update_product(Uuid::now_v7(), update)
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_marks_product_and_commits() {
        let product = stored(create_input(None));
        let id = product.id;
        let mut deleted = product.clone();
        deleted.is_deleted = true;

        let mut tx = MockProductTransaction::new();
        tx.expect_find_by_id()
            .with(eq(id))
            .return_once(move |_| Ok(Some(product)));
        tx.expect_mark_deleted()
            .with(eq(id))
            .return_once(move |_| Ok(Some(deleted)));
        tx.expect_commit().times(1).returning(|| Ok(()));
        tx.expect_abort().never();

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);

        let service = ProductService::new(repo, MockMediaUploader::new());
        let result = service.delete_product(id).await.unwrap();
        assert!(result.is_deleted);
    }

    #[tokio::test]
    async fn test_delete_failed_commit_aborts() {
        let product = stored(create_input(None));
        let id = product.id;
        let mut deleted = product.clone();
        deleted.is_deleted = true;

        let mut tx = MockProductTransaction::new();
        tx.expect_find_by_id()
            .return_once(move |_| Ok(Some(product)));
        tx.expect_mark_deleted()
            .return_once(move |_| Ok(Some(deleted)));
        tx.expect_commit()
            .times(1)
            .returning(|| Err(ProductError::Database("commit result unknown".to_string())));
        tx.expect_abort().times(1).returning(|| Ok(()));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);

        let service = ProductService::new(repo, MockMediaUploader::new());
        let err = service.delete_product(id).await.unwrap_err();
        assert!(matches!(err, ProductError::Database(ref msg) if msg == "commit result unknown"));
    }

    #[tokio::test]
    async fn test_delete_already_deleted() {
        let mut product = stored(create_input(None));
        product.is_deleted = true;
        let id = product.id;

        let mut tx = MockProductTransaction::new();
        tx.expect_find_by_id()
            .return_once(move |_| Ok(Some(product)));
        tx.expect_mark_deleted().never();
        tx.expect_commit().never();
        tx.expect_abort().times(1).returning(|| Ok(()));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);

        let service = ProductService::new(repo, MockMediaUploader::new());
        let err = service.delete_product(id).await.unwrap_err();

        assert!(matches!(err, ProductError::AlreadyDeleted(_)));
        assert_eq!(err.to_string(), "Product is already deleted!");
    }

    #[tokio::test]
    async fn test_delete_unknown_product() {
        let mut tx = MockProductTransaction::new();
        tx.expect_find_by_id().returning(|_| Ok(None));
        tx.expect_abort().times(1).returning(|| Ok(()));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);

        let service = ProductService::new(repo, MockMediaUploader::new());
        let err = service.delete_product(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, ProductError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_with_no_updated_record_is_bad_request() {
        let product = stored(create_input(None));
        let id = product.id;

        let mut tx = MockProductTransaction::new();
        tx.expect_find_by_id()
            .return_once(move |_| Ok(Some(product)));
        tx.expect_mark_deleted().returning(|_| Ok(None));
        tx.expect_commit().never();
        tx.expect_abort().times(1).returning(|| Ok(()));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);

        let service = ProductService::new(repo, MockMediaUploader::new());
        let err = service.delete_product(id).await.unwrap_err();
        assert!(matches!(err, ProductError::BadRequest(ref msg) if msg == "Failed to delete Product"));
    }

    #[tokio::test]
    async fn test_delete_failure_after_check_aborts_and_keeps_kind() {
        let product = stored(create_input(None));
        let id = product.id;

        let mut tx = MockProductTransaction::new();
        tx.expect_find_by_id()
            .return_once(move |_| Ok(Some(product)));
        tx.expect_mark_deleted()
            .returning(|_| Err(ProductError::Database("connection reset".to_string())));
        tx.expect_commit().never();
        tx.expect_abort()
            .times(1)
            .returning(|| Err(ProductError::Database("session gone".to_string())));

        let mut repo = MockProductRepository::new();
        with_transaction(&mut repo, tx);

        let service = ProductService::new(repo, MockMediaUploader::new());
        let err = service.delete_product(id).await.unwrap_err();
        assert!(matches!(err, ProductError::Database(ref msg) if msg == "connection reset"));
    }
}
