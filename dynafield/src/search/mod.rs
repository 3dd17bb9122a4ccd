//! Search-index side of the engine: the filter-expression formatting rules,
//! the request/response shapes of the index API, and the [`SearchIndex`]
//! client seam. The index grammar is the usual attribute-filter syntax:
//! `field = "value"` equality, `field >= n` bounds, clauses joined with
//! ` AND `, membership groups joined with ` OR ` and parenthesized.
//!
//! ## Operand formatting quick reference
//!
//! | Input        | Output         | Why                                  |
//! |--------------|----------------|--------------------------------------|
//! | `red`        | `"red"`        | plain strings are quoted             |
//! | `6" screen`  | `"6\" screen"` | embedded quotes escaped              |
//! | `3500`       | `3500`         | pure numeric literal stays bare      |
//! | `true`       | `true`         | boolean literal stays bare           |
//! | `42b`        | `"42b"`        | not a literal, quoted like any text  |

pub mod client;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{projector::IndexDocument, types::BoundFields};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_HITS_PER_PAGE: u64 = 24;
pub const MAX_HITS_PER_PAGE: u64 = 100;

/// Failure talking to the external index. Write-path callers log and
/// swallow these; read-path callers surface them.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("index rejected request with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode index response: {message}")]
    Decode { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One sort instruction, rendered as `column:order` for the index API.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub column: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn render(&self) -> String {
        format!("{}:{}", self.column, self.order.as_str())
    }
}

/// Query payload sent to the index's search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<String>,
    pub page: u64,
    pub hits_per_page: u64,
}

/// Search response page. Hit documents stay opaque json; the HTTP layer
/// owning this crate decides how to present them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHits {
    #[serde(default)]
    pub hits: Vec<Value>,
    #[serde(default)]
    pub total_hits: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub hits_per_page: u64,
}

/// Attribute lists the index needs declared before filtering/sorting on a
/// key works. Derived from the schema flags, merged over the fixed
/// columns every listing document carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    pub searchable_attributes: Vec<String>,
    pub filterable_attributes: Vec<String>,
    pub sortable_attributes: Vec<String>,
}

impl IndexSettings {
    pub fn for_fields(fields: &BoundFields) -> Self {
        let mut settings = Self {
            searchable_attributes: ["title", "excerpt", "location"].map(String::from).to_vec(),
            filterable_attributes: ["service_type", "service_type_id", "price"].map(String::from).to_vec(),
            sortable_attributes: ["price", "created_at"].map(String::from).to_vec(),
        };
        for (key, bound) in fields {
            if bound.field.searchable {
                settings.searchable_attributes.push(key.clone());
            }
            if bound.filterable() {
                settings.filterable_attributes.push(key.clone());
            }
            if bound.field.sortable {
                settings.sortable_attributes.push(key.clone());
            }
        }
        settings
    }
}

/// Client seam to the external search index. Implementations are supplied
/// by the caller; the crate ships [`client::HttpSearchIndex`].
#[allow(async_fn_in_trait)]
pub trait SearchIndex {
    async fn add_or_update(&self, document: &IndexDocument) -> Result<(), IndexError>;

    async fn delete_by_id(&self, listing_id: i64) -> Result<(), IndexError>;

    async fn search(&self, request: &SearchRequest) -> Result<SearchHits, IndexError>;

    /// Declare the attribute lists on the index.
    async fn configure(&self, settings: &IndexSettings) -> Result<(), IndexError>;
}

/// Quote a value for interpolation into a filter expression, escaping
/// embedded quotes and backslashes.
pub fn quote(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for ch in raw.chars() {
        match ch {
            '\\' | '"' => {
                quoted.push('\\');
                quoted.push(ch);
            }
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

/// Format an operand for the filter grammar: pure numeric and boolean
/// literals stay bare, everything else is quoted.
pub fn format_operand(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "true" || trimmed == "false" {
        return trimmed.to_string();
    }
    if !trimmed.is_empty() && trimmed.parse::<f64>().is_ok() {
        return trimmed.to_string();
    }
    quote(raw)
}

/// Render a numeric bound without a trailing `.0` for whole values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}
