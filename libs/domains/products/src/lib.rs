//! Products Domain
//!
//! Product catalogue backed by MongoDB, with product images hosted on
//! Cloudinary.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, multipart spooling
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌─────────────┐
//! │   Service   │ ──▶ │    Media    │  ← image uploads
//! └──────┬──────┘     └─────────────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access and transactions (trait + MongoDB implementation)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs
//! └─────────────┘
//! ```
//!
//! Products are never removed: delete sets `isDeleted`, and the product stays
//! readable by id.
//!
//! # Usage
//!
//! ```rust,no_run
//! use core_config::FromEnv;
//! use domain_products::{
//!     handlers,
//!     media::{CloudinaryConfig, CloudinaryUploader},
//!     mongodb::MongoProductRepository,
//!     service::ProductService,
//! };
//! use mongodb::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::with_uri_str("mongodb://localhost:27017/?replicaSet=rs0").await?;
//!
//! let repository = MongoProductRepository::new(client, "shop");
//! let uploader = CloudinaryUploader::new(CloudinaryConfig::from_env()?);
//! let service = ProductService::new(repository, uploader);
//!
//! let router = handlers::router(service);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod media;
pub mod models;
pub mod mongodb;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use error::{ProductError, ProductResult};
pub use handlers::ApiDoc;
pub use media::{CloudinaryConfig, CloudinaryUploader, MediaUploader, UploadedFile, UploadedImage};
pub use models::{
    CreateProduct, Product, ProductName, ProductPage, UpdateProduct, UpdateProductName,
};
pub use mongodb::MongoProductRepository;
pub use repository::{ProductRepository, ProductTransaction};
pub use service::ProductService;
