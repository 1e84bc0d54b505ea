//! JSON extractor with automatic validation using the validator crate.

use crate::errors::AppError;
use axum::{
    extract::{FromRequest, Json, Request},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON extractor with automatic validation.
///
/// Deserialization failures keep axum's status (400/415/422); `validate()`
/// failures become 400 `VALIDATION_ERROR` with per-field details.
///
/// # Example
/// ```ignore
/// use axum::Router;
/// use axum::routing::patch;
/// use axum_helpers::extractors::ValidatedJson;
/// use serde::Deserialize;
/// use validator::Validate;
///
/// #[derive(Deserialize, Validate)]
/// struct UpdatePrice {
///     #[validate(range(min = 0.0))]
///     price: f64,
/// }
///
/// async fn update(ValidatedJson(payload): ValidatedJson<UpdatePrice>) -> String {
///     format!("New price: {}", payload.price)
/// }
///
/// let app = Router::new().route("/products/{id}", patch(update));
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::from(e).into_response())?;

        data.validate()
            .map_err(|e| AppError::from(e).into_response())?;

        Ok(ValidatedJson(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorResponse;
    use axum::{Router, body::Body, http::Request, http::StatusCode, http::header, routing::post};
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize, Validate)]
    struct Payload {
        #[validate(range(min = 0.0))]
        price: f64,
    }

    async fn send(body: &str) -> Response {
        Router::new()
            .route(
                "/",
                post(|ValidatedJson(p): ValidatedJson<Payload>| async move { p.price.to_string() }),
            )
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_payload_passes() {
        assert_eq!(send(r#"{"price": 12.5}"#).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validation_failure_lists_field() {
        let response = send(r#"{"price": -1}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "VALIDATION_ERROR");
        assert!(body.details.unwrap().get("price").is_some());
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let response = send("{not json").await;
        assert!(response.status().is_client_error());
    }
}
