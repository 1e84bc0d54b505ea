use super::shutdown::ShutdownCoordinator;
use crate::errors::handlers::not_found;
use crate::http::{cors_origins_from_env, create_cors_layer, security_headers};
use axum::{Router, middleware};
use core_config::server::ServerConfig;
use std::future::Future;
use std::io;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_redoc::{Redoc, Servable as RedocServable};
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

/// Wrap domain routes with API docs and the cross-cutting middleware.
///
/// - OpenAPI documentation at `/swagger-ui`, `/redoc`, `/rapidoc`, `/scalar`
///   (spec served from `/api-docs/openapi.json`)
/// - `apis` nested under `/api`
/// - Request tracing, security headers, CORS and response compression
/// - JSON 404 fallback
///
/// Health endpoints are merged by the binary via
/// [`health_router`](super::health_router).
///
/// # CORS Configuration (Required)
///
/// `CORS_ALLOWED_ORIGIN` must hold a comma-separated list of origins.
///
/// # Errors
/// Returns `InvalidInput` if `CORS_ALLOWED_ORIGIN` is missing, empty or
/// contains an invalid header value.
///
/// # Example
/// ```ignore
/// let api_routes = Router::new().nest("/products", domain_products::handlers::router(service));
/// let router = create_router::<ApiDoc>(api_routes).await?;
/// ```
pub async fn create_router<T>(apis: Router) -> io::Result<Router>
where
    T: OpenApi + 'static,
{
    let allowed_origins = cors_origins_from_env()?;
    info!(origins = allowed_origins.len(), "CORS configured");

    Ok(with_docs_and_layers::<T>(apis)
        .layer(create_cors_layer(allowed_origins))
        // gzip, br, deflate, zstd based on Accept-Encoding
        .layer(CompressionLayer::new()))
}

fn with_docs_and_layers<T>(apis: Router) -> Router
where
    T: OpenApi + 'static,
{
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", T::openapi()))
        .merge(Redoc::with_url("/redoc", T::openapi()))
        .merge(RapiDoc::new("/api-docs/openapi.json").path("/rapidoc"))
        .merge(Scalar::with_url("/scalar", T::openapi()))
        .nest("/api", apis)
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(security_headers))
}

/// Serve with coordinated shutdown and a bounded cleanup phase.
///
/// On SIGINT/SIGTERM the server stops accepting connections, drains
/// in-flight requests and runs `cleanup` (e.g. closing the MongoDB client)
/// for at most `shutdown_timeout`.
///
/// # Example
/// ```ignore
/// let client = state.mongo_client.clone();
/// let cleanup = async move { client.shutdown().await };
///
/// create_production_app(router, &config, Duration::from_secs(30), cleanup).await?;
/// ```
pub async fn create_production_app<F>(
    router: Router,
    server_config: &ServerConfig,
    shutdown_timeout: Duration,
    cleanup: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (coordinator, mut shutdown_rx) = ShutdownCoordinator::new();

    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;
    info!("Server starting on {}", listener.local_addr()?);

    let cleanup_handle = tokio::spawn(async move {
        let _ = shutdown_rx.recv().await;

        info!("Starting cleanup tasks (timeout: {:?})", shutdown_timeout);
        match tokio::time::timeout(shutdown_timeout, cleanup).await {
            Ok(()) => info!("Cleanup completed successfully"),
            Err(_) => {
                tracing::warn!(
                    "Cleanup exceeded timeout of {:?}, forcing shutdown",
                    shutdown_timeout
                );
            }
        }
    });

    let signal = coordinator.clone();
    let serve_result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { signal.wait_for_signal().await })
        .await
        .inspect_err(|e| {
            tracing::error!("Server encountered an error: {:?}", e);
        });

    // Covers the server exiting on its own error before any signal
    coordinator.shutdown();
    cleanup_handle.await.ok();

    serve_result
}
