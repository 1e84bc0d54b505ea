//! HTTP handlers for Products API

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use axum_helpers::{
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse, NotFoundResponse,
    },
    AppError, UuidPath, ValidatedJson,
};
use database::mongodb::PageMeta;
use tempfile::NamedTempFile;
use utoipa::{OpenApi, ToSchema};

use crate::error::ProductResult;
use crate::media::{MediaUploader, UploadedFile};
use crate::models::{
    CreateProduct, Product, ProductName, ProductPage, UpdateProduct, UpdateProductName,
};
use crate::repository::ProductRepository;
use crate::service::ProductService;

/// Request body cap for product creation, uploads included
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// OpenAPI documentation for Products API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        create_product,
        get_product,
        update_product,
        delete_product,
    ),
    components(
        schemas(
            Product, ProductName, CreateProduct, CreateProductForm,
            UpdateProduct, UpdateProductName, ProductPage, PageMeta
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Products", description = "Product management endpoints")
    )
)]
pub struct ApiDoc;

/// Multipart body accepted by `POST /products`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct CreateProductForm {
    /// `CreateProduct` encoded as JSON
    data: String,
    /// Image to upload; repeat the field for several files
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Create the products router with all HTTP endpoints
pub fn router<R, U>(service: ProductService<R, U>) -> Router
where
    R: ProductRepository + 'static,
    U: MediaUploader + 'static,
{
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_products::<R, U>).post(create_product::<R, U>))
        .route(
            "/{id}",
            get(get_product::<R, U>)
                .patch(update_product::<R, U>)
                .delete(delete_product::<R, U>),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(shared_service)
}

/// List products with search, filters, sorting and pagination
///
/// Any query key other than the reserved ones filters on the field of that
/// name; `field[gt|gte|lt|lte|ne]=value` compares.
#[utoipa::path(
    get,
    path = "",
    tag = "Products",
    params(
        ("searchTerm" = Option<String>, Query, description = "Case-insensitive match on name, description, category and brand"),
        ("sort" = Option<String>, Query, description = "Comma-separated fields, `-` prefix for descending", example = "-price,createdAt"),
        ("page" = Option<u64>, Query, description = "Page number, from 1"),
        ("limit" = Option<u64>, Query, description = "Page size, at most 100"),
        ("fields" = Option<String>, Query, description = "Comma-separated projection, `-` prefix to exclude", example = "name,price")
    ),
    responses(
        (status = 200, description = "One page of products", body = ProductPage),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<R: ProductRepository, U: MediaUploader>(
    State(service): State<Arc<ProductService<R, U>>>,
    Query(params): Query<HashMap<String, String>>,
) -> ProductResult<Json<ProductPage>> {
    let page = service.list_products(params).await?;
    Ok(Json(page))
}

/// Create a product, uploading any attached images first
#[utoipa::path(
    post,
    path = "",
    tag = "Products",
    request_body(content = CreateProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Product created successfully", body = Vec<Product>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<R: ProductRepository, U: MediaUploader>(
    State(service): State<Arc<ProductService<R, U>>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = CreateForm::read(multipart).await?;
    let input = form
        .input
        .ok_or_else(|| AppError::BadRequest("Missing `data` field".to_string()))?;

    let products = service.create_product(form.files, input).await?;
    drop(form.spool);

    Ok((StatusCode::CREATED, Json(products)))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<R: ProductRepository, U: MediaUploader>(
    State(service): State<Arc<ProductService<R, U>>>,
    UuidPath(id): UuidPath,
) -> ProductResult<Json<Product>> {
    let product = service.get_product(id).await?;
    Ok(Json(product))
}

/// Update a product
///
/// `name` is merged per key; every other field present replaces the stored one.
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated successfully", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<R: ProductRepository, U: MediaUploader>(
    State(service): State<Arc<ProductService<R, U>>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateProduct>,
) -> ProductResult<Json<Product>> {
    let product = service.update_product(id, input).await?;
    Ok(Json(product))
}

/// Soft-delete a product
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Products",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product marked deleted", body = Product),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<R: ProductRepository, U: MediaUploader>(
    State(service): State<Arc<ProductService<R, U>>>,
    UuidPath(id): UuidPath,
) -> ProductResult<Json<Product>> {
    let product = service.delete_product(id).await?;
    Ok(Json(product))
}

/// Parsed create form. Spooled files live until `spool` is dropped.
struct CreateForm {
    input: Option<CreateProduct>,
    files: Vec<UploadedFile>,
    spool: Vec<NamedTempFile>,
}

impl CreateForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = CreateForm {
            input: None,
            files: Vec::new(),
            spool: Vec::new(),
        };

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "data" => {
                    let text = field.text().await?;
                    let input = serde_json::from_str(&text).map_err(|e| {
                        AppError::BadRequest(format!("Invalid product data: {e}"))
                    })?;
                    form.input = Some(input);
                }
                "file" => {
                    let file_name = field.file_name().map(String::from);
                    let content_type = field.content_type().map(String::from);
                    let bytes = field.bytes().await?;

                    let temp = NamedTempFile::new()?;
                    tokio::fs::write(temp.path(), &bytes).await?;

                    form.files.push(UploadedFile {
                        path: temp.path().to_path_buf(),
                        file_name,
                        content_type,
                    });
                    form.spool.push(temp);
                }
                _ => {}
            }
        }

        Ok(form)
    }
}
