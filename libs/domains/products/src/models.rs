use chrono::{DateTime, SecondsFormat, Utc};
use database::mongodb::PageMeta;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Fields matched by the `searchTerm` query parameter
pub const PRODUCT_SEARCHABLE_FIELDS: [&str; 6] = [
    "name.first",
    "name.second",
    "name.last",
    "description",
    "category",
    "brand",
];

/// Structured product name; updates merge it per key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProductName {
    #[validate(length(min = 1, max = 100))]
    pub first: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub second: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100))]
    pub last: Option<String>,
}

impl ProductName {
    /// Present name parts joined by spaces
    pub fn full(&self) -> String {
        [Some(self.first.as_str()), self.second.as_deref(), self.last.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Product entity - represents a product stored in MongoDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (stored as _id in MongoDB)
    #[serde(rename = "_id", alias = "id", with = "uuid_string")]
    pub id: Uuid,
    pub name: ProductName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Hosted image URLs, oldest first
    #[serde(default)]
    pub image_url: Vec<String>,
    /// Set once by soft-delete, never cleared
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a new product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    #[validate(nested)]
    pub name: ProductName,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i64,
    pub category: Option<String>,
    pub brand: Option<String>,
    /// Already-hosted images; uploads are appended after these
    pub image_url: Option<Vec<String>>,
}

/// Partial name update; only present keys are written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductName {
    #[validate(length(min = 1, max = 100))]
    pub first: Option<String>,
    #[validate(length(max = 100))]
    pub second: Option<String>,
    #[validate(length(max = 100))]
    pub last: Option<String>,
}

impl UpdateProductName {
    /// `(key, value)` pairs for the keys present in this update
    pub fn present_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("first", self.first.as_deref()),
            ("second", self.second.as_deref()),
            ("last", self.last.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

/// DTO for updating an existing product
///
/// `isDeleted` is deliberately absent: only soft-delete may set it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    #[validate(nested)]
    pub name: Option<UpdateProductName>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 0))]
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<Vec<String>>,
}

/// One page of a product listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductPage {
    pub meta: PageMeta,
    /// Products, possibly narrowed by the `fields` projection
    #[schema(value_type = Vec<Object>)]
    pub result: Vec<serde_json::Value>,
}

impl Product {
    /// Create a new product from CreateProduct DTO
    pub fn new(input: CreateProduct) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: input.name,
            description: input.description,
            price: input.price,
            stock: input.stock,
            category: input.category,
            brand: input.brand,
            image_url: input.image_url.unwrap_or_default(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Stored timestamp format: RFC 3339, UTC, millisecond precision.
///
/// Fixed width keeps string order equal to time order for `sort=createdAt`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(timestamp))
}

/// Hyphenated string ids in both JSON and BSON
pub(crate) mod uuid_string {
    use super::*;

    pub fn serialize<S: Serializer>(id: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Uuid, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Uuid::parse_str(&raw).map_err(serde::de::Error::custom)
    }
}
