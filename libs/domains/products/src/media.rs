//! Product image hosting.
//!
//! Uploads happen outside the database transaction: an image that reached the
//! host stays there even if the surrounding write is aborted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_config::{env_optional, env_or_default, env_required, ConfigError, FromEnv};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::error::{ProductError, ProductResult};

pub const DEFAULT_CLOUDINARY_BASE_URL: &str = "https://api.cloudinary.com/v1_1";

/// A file received with a create request, spooled to local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// Where the host stored an image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload the file at `path` under `image_name`
    async fn upload(&self, image_name: &str, path: &Path) -> ProductResult<UploadedImage>;
}

#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: Option<String>,
    pub base_url: String,
}

impl CloudinaryConfig {
    fn upload_url(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.base_url.trim_end_matches('/'),
            self.cloud_name
        )
    }
}

impl FromEnv for CloudinaryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cloud_name: env_required("CLOUDINARY_CLOUD_NAME")?,
            api_key: env_required("CLOUDINARY_API_KEY")?,
            api_secret: env_required("CLOUDINARY_API_SECRET")?,
            folder: env_optional("CLOUDINARY_FOLDER"),
            base_url: env_or_default("CLOUDINARY_BASE_URL", DEFAULT_CLOUDINARY_BASE_URL),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CloudinaryResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
}

/// Signed uploads to the Cloudinary REST API
#[derive(Clone)]
pub struct CloudinaryUploader {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: CloudinaryConfig) -> Self {
        Self { http, config }
    }

    /// Parameters covered by the signature, sorted by key
    fn signed_params(&self, public_id: &str, timestamp: i64) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", timestamp.to_string());
        if let Some(ref folder) = self.config.folder {
            params.insert("folder", folder.clone());
        }
        params
    }
}

/// Hex SHA-256 of `k1=v1&k2=v2…` followed by the API secret
fn sign(params: &BTreeMap<&'static str, String>, api_secret: &str) -> String {
    let payload = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    #[instrument(skip(self, path), fields(image_name = %image_name))]
    async fn upload(&self, image_name: &str, path: &Path) -> ProductResult<UploadedImage> {
        let bytes = tokio::fs::read(path).await?;
        let timestamp = Utc::now().timestamp();
        let params = self.signed_params(image_name, timestamp);
        let signature = sign(&params, &self.config.api_secret);

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(image_name.to_string()))
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .http
            .post(self.config.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProductError::Upload(format!(
                "image host responded {status}: {body}"
            )));
        }

        let body: CloudinaryResponse = response.json().await?;
        let secure_url = body
            .secure_url
            .ok_or_else(|| ProductError::Upload("response has no secure_url".to_string()))?;

        tracing::info!(%secure_url, "Image uploaded");
        Ok(UploadedImage {
            secure_url,
            public_id: body.public_id.unwrap_or_else(|| image_name.to_string()),
        })
    }
}

/// Name for the `index`-th image uploaded with a product.
///
/// `<slug>-<unix-millis>` for the first file; later files get a `-<index>`
/// suffix so one request never reuses a name.
pub fn image_name(product_name: &str, now: DateTime<Utc>, index: usize) -> String {
    let mut slug = String::with_capacity(product_name.len());
    for c in product_name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let slug = if slug.is_empty() { "product" } else { slug };

    let millis = now.timestamp_millis();
    if index == 0 {
        format!("{slug}-{millis}")
    } else {
        format!("{slug}-{millis}-{index}")
    }
}
