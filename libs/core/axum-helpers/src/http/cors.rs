use axum::http::{HeaderValue, Method, header};
use std::io;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Comma-separated list of allowed origins
pub const CORS_ORIGIN_ENV: &str = "CORS_ALLOWED_ORIGIN";

/// Parse a comma-separated origin list, skipping blanks.
///
/// An empty result is an error: a browser-facing API without any allowed
/// origin is almost always a deployment mistake.
pub fn parse_origins(raw: &str) -> io::Result<Vec<HeaderValue>> {
    let origins = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid {CORS_ORIGIN_ENV} value: {e}"),
            )
        })?;

    if origins.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{CORS_ORIGIN_ENV} cannot be empty"),
        ));
    }

    Ok(origins)
}

/// Read and parse `CORS_ALLOWED_ORIGIN`; the variable is required.
///
/// - Development: `CORS_ALLOWED_ORIGIN=http://localhost:3000,http://localhost:5173`
/// - Production: `CORS_ALLOWED_ORIGIN=https://shop.example.com`
pub fn cors_origins_from_env() -> io::Result<Vec<HeaderValue>> {
    let raw = std::env::var(CORS_ORIGIN_ENV).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{CORS_ORIGIN_ENV} environment variable is required. Example: {CORS_ORIGIN_ENV}=http://localhost:3000"
            ),
        )
    })?;

    parse_origins(&raw)
}

/// CORS layer for the products API.
///
/// - Methods: GET, POST, PATCH, DELETE, OPTIONS
/// - Headers: Content-Type, Accept
/// - Credentials allowed, 1 hour max age
pub fn create_cors_layer(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
