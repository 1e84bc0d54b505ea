use mongodb::bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use utoipa::ToSchema;

/// Query keys consumed by the builder itself; everything else is a filter
pub const RESERVED_KEYS: [&str; 5] = ["searchTerm", "sort", "limit", "page", "fields"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;
pub const DEFAULT_SORT: &str = "-createdAt";

const DEFAULT_PROJECTION: &str = "-__v";
const COMPARISON_OPS: [&str; 5] = ["gt", "gte", "lt", "lte", "ne"];

/// A find request ready to hand to the driver
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub sort: Document,
    pub page: u64,
    pub limit: u64,
    pub projection: Document,
}

impl FindQuery {
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Page metadata for a filter that matched `total` documents
    pub fn meta(&self, total: u64) -> PageMeta {
        PageMeta {
            page: self.page,
            limit: self.limit,
            total,
            total_page: total.div_ceil(self.limit),
        }
    }
}

/// Pagination block returned next to a page of results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u64,
    pub limit: u64,
    /// Matches ignoring pagination
    pub total: u64,
    pub total_page: u64,
}

/// Builds a [`FindQuery`] from flat HTTP query parameters.
///
/// Steps are applied in call order and each reads its own reserved key:
///
/// ```ignore
/// let query = QueryBuilder::new(params)
///     .search(&["name.first", "description"])
///     .filter()
///     .sort()
///     .paginate()
///     .fields()
///     .build();
/// ```
///
/// Filters support `key=value` equality and `key[op]=value` comparisons for
/// `gt`, `gte`, `lt`, `lte` and `ne`. Values are typed as bool, integer,
/// float, then string, in that order.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    params: BTreeMap<String, String>,
    query: FindQuery,
}

impl QueryBuilder {
    pub fn new<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            query: FindQuery {
                filter: Document::new(),
                sort: parse_sort(DEFAULT_SORT),
                page: DEFAULT_PAGE,
                limit: DEFAULT_LIMIT,
                projection: parse_projection(DEFAULT_PROJECTION),
            },
        }
    }

    /// Case-insensitive `searchTerm` match against any of `fields`
    pub fn search(mut self, fields: &[&str]) -> Self {
        let Some(term) = self.param("searchTerm") else {
            return self;
        };
        if fields.is_empty() {
            return self;
        }

        let pattern = regex::escape(term);
        let clauses: Vec<Bson> = fields
            .iter()
            .map(|field| {
                let mut clause = Document::new();
                clause.insert(*field, doc! { "$regex": &pattern, "$options": "i" });
                Bson::Document(clause)
            })
            .collect();

        self.query.filter.insert("$or", clauses);
        self
    }

    /// Equality and comparison filters from every non-reserved key
    pub fn filter(mut self) -> Self {
        for (key, raw) in &self.params {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }

            let Some((field, op)) = split_filter_key(key) else {
                debug!(key = %key, "Ignoring unsupported filter key");
                continue;
            };
            let value = coerce_value(raw);

            match op {
                None => {
                    self.query.filter.insert(field, value);
                }
                Some(op) => {
                    // `price=10&price[gt]=5` keeps both as `{ $eq, $gt }`
                    let mut ops = match self.query.filter.remove(field) {
                        Some(Bson::Document(ops)) => ops,
                        Some(equal) => doc! { "$eq": equal },
                        None => Document::new(),
                    };
                    ops.insert(format!("${op}"), value);
                    self.query.filter.insert(field, ops);
                }
            }
        }
        self
    }

    /// `sort=-price,name` style ordering; `-` means descending
    pub fn sort(mut self) -> Self {
        if let Some(spec) = self.param("sort") {
            let sort = parse_sort(spec);
            if !sort.is_empty() {
                self.query.sort = sort;
            }
        }
        self
    }

    /// Page and limit; `page` is capped so the skip still fits the driver's i64
    pub fn paginate(mut self) -> Self {
        self.query.limit = self
            .positive("limit")
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        let last_page = i64::MAX as u64 / self.query.limit + 1;
        self.query.page = self
            .positive("page")
            .unwrap_or(DEFAULT_PAGE)
            .min(last_page);
        self
    }

    /// `fields=name,price` includes, `fields=-description` excludes
    pub fn fields(mut self) -> Self {
        if let Some(spec) = self.param("fields") {
            let projection = parse_projection(spec);
            if !projection.is_empty() {
                self.query.projection = projection;
            }
        }
        self
    }

    pub fn build(self) -> FindQuery {
        self.query
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn positive(&self, key: &str) -> Option<u64> {
        self.param(key)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v >= 1)
    }
}

/// `price[gte]` -> (`price`, Some(`gte`)), `brand` -> (`brand`, None)
fn split_filter_key(key: &str) -> Option<(&str, Option<&str>)> {
    if key.is_empty() || key.starts_with('$') {
        return None;
    }

    match key.split_once('[') {
        None => Some((key, None)),
        Some((field, rest)) => {
            let op = rest.strip_suffix(']')?;
            if field.is_empty() || !COMPARISON_OPS.contains(&op) {
                return None;
            }
            Some((field, Some(op)))
        }
    }
}

fn coerce_value(raw: &str) -> Bson {
    match raw {
        "true" => return Bson::Boolean(true),
        "false" => return Bson::Boolean(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Bson::Int64(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Bson::Double(f),
        _ => Bson::String(raw.to_string()),
    }
}

fn parse_sort(spec: &str) -> Document {
    parse_field_list(spec, 1, -1)
}

fn parse_projection(spec: &str) -> Document {
    parse_field_list(spec, 1, 0)
}

/// Comma-separated field names, `-` prefixed ones mapped to `negated`
fn parse_field_list(spec: &str, plain: i32, negated: i32) -> Document {
    let mut fields = Document::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.strip_prefix('-') {
            Some("") => {}
            Some(field) => {
                fields.insert(field, negated);
            }
            None => {
                fields.insert(part, plain);
            }
        }
    }
    fields
}
