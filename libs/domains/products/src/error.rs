use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use mongodb::error::TRANSIENT_TRANSACTION_ERROR;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product not found!")]
    NotFound(Uuid),

    /// Kept apart from `NotFound` but rendered as 404 like it
    #[error("Product is already deleted!")]
    AlreadyDeleted(Uuid),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Upload failed: {0}")]
    Upload(String),

    /// Transaction lost a write conflict against a concurrent request
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ProductResult<T> = Result<T, ProductError>;

/// Convert ProductError to AppError for standardized error responses
impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            e @ (ProductError::NotFound(_) | ProductError::AlreadyDeleted(_)) => {
                AppError::NotFound(e.to_string())
            }
            ProductError::BadRequest(msg) => AppError::BadRequest(msg),
            ProductError::Validation(errors) => AppError::ValidationError(errors),
            ProductError::Upload(msg) => AppError::Upload(msg),
            ProductError::Conflict(msg) => AppError::Conflict(msg),
            ProductError::Database(msg) => AppError::Database(msg),
            ProductError::Io(e) => AppError::Io(e),
            ProductError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<mongodb::error::Error> for ProductError {
    fn from(err: mongodb::error::Error) -> Self {
        if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
            ProductError::Conflict(err.to_string())
        } else {
            ProductError::Database(err.to_string())
        }
    }
}

impl From<reqwest::Error> for ProductError {
    fn from(err: reqwest::Error) -> Self {
        ProductError::Upload(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_not_found_kinds_render_404() {
        let id = Uuid::now_v7();

        let missing = ProductError::NotFound(id).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let deleted = ProductError::AlreadyDeleted(id).into_response();
        assert_eq!(deleted.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_messages() {
        let id = Uuid::now_v7();
        assert_eq!(ProductError::NotFound(id).to_string(), "Product not found!");
        assert_eq!(
            ProductError::AlreadyDeleted(id).to_string(),
            "Product is already deleted!"
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ProductError::BadRequest("Failed to create Product".into()),
                StatusCode::BAD_REQUEST,
            ),
            (ProductError::Upload("timeout".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ProductError::Database("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ProductError::Conflict("WriteConflict".into()), StatusCode::CONFLICT),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
