//! Products API routes

use axum::Router;
use domain_products::{handlers, CloudinaryUploader, MongoProductRepository, ProductService};

use crate::state::AppState;

fn repository(state: &AppState) -> MongoProductRepository {
    MongoProductRepository::new(state.mongo_client.clone(), state.config.mongodb.database())
}

/// Create products router
pub fn router(state: &AppState) -> Router {
    let uploader =
        CloudinaryUploader::with_client(state.http.clone(), state.config.cloudinary.clone());
    let service = ProductService::new(repository(state), uploader);
    handlers::router(service)
}

/// Initialize products indexes
pub async fn init_indexes(state: &AppState) -> eyre::Result<()> {
    repository(state).init_indexes().await?;
    Ok(())
}
