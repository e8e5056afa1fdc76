//! Public catalog search (shopping and hotels)
//!
//! `catalog_search` fans sub-queries out to a [`CatalogSearch`] backend and
//! turns its compact hits into chunks keyed by the listing link. It is
//! disabled for personal searches.

use super::context::{Chunk, RequestContext};
use super::fanout::fan_out;
use super::{validate_queries, Action, ActionKind, SearchOutput, ValidateInput};
use crate::error::Result;
use crate::planner::Vertical;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Catalog to search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    #[default]
    Shopping,
    Hotels,
}

impl CatalogKind {
    /// Catalog serving a plan vertical, if any
    pub fn for_vertical(vertical: Vertical) -> Option<Self> {
        match vertical {
            Vertical::Product => Some(CatalogKind::Shopping),
            Vertical::Hotel => Some(CatalogKind::Hotels),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Shopping => "shopping",
            CatalogKind::Hotels => "hotels",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact shopping listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub title: String,
    pub price: String,
    pub link: String,
    pub source: String,
    pub thumbnail: String,
    /// Promotion label, e.g. "18% OFF"
    pub tag: String,
    pub delivery: String,
    pub rating: String,
    pub reviews: String,
    pub extracted_price: String,
    pub old_price: String,
}

/// Compact hotel listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotelItem {
    pub name: String,
    pub address: String,
    pub price: String,
    pub rating: String,
    pub reviews: String,
    pub thumbnail: String,
    pub link: String,
    pub amenities: Vec<String>,
    pub booking_link: String,
    pub booking_site: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub description: String,
}

/// One catalog result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogHit {
    Product(ShoppingItem),
    Hotel(HotelItem),
}

impl CatalogHit {
    /// Listing link, the chunk identity
    pub fn link(&self) -> &str {
        match self {
            CatalogHit::Product(item) => &item.link,
            CatalogHit::Hotel(item) => &item.link,
        }
    }

    /// Display title
    pub fn title(&self) -> &str {
        match self {
            CatalogHit::Product(item) => &item.title,
            CatalogHit::Hotel(item) => &item.name,
        }
    }

    /// Short readable summary used as chunk content
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match self {
            CatalogHit::Product(item) => {
                parts.push(item.title.clone());
                if !item.price.is_empty() {
                    parts.push(item.price.clone());
                }
                if !item.source.is_empty() {
                    parts.push(format!("from {}", item.source));
                }
                if !item.rating.is_empty() {
                    parts.push(format!("rated {}", item.rating));
                }
                if !item.tag.is_empty() {
                    parts.push(item.tag.clone());
                }
            }
            CatalogHit::Hotel(item) => {
                parts.push(item.name.clone());
                if !item.address.is_empty() {
                    parts.push(item.address.clone());
                }
                if !item.price.is_empty() {
                    parts.push(item.price.clone());
                }
                if !item.rating.is_empty() {
                    parts.push(format!("rated {}", item.rating));
                }
                if !item.description.is_empty() {
                    parts.push(item.description.clone());
                }
            }
        }
        parts.retain(|p| !p.trim().is_empty());
        parts.join(" | ")
    }

    /// Chunk with the listing fields as metadata
    pub fn into_chunk(self) -> Chunk {
        let mut chunk = Chunk::new(self.summary());
        if !self.title().is_empty() {
            chunk.metadata.title = Some(self.title().to_string());
        }
        if !self.link().is_empty() {
            chunk.metadata.url = Some(self.link().to_string());
        }
        if let Ok(Value::Object(fields)) = serde_json::to_value(&self) {
            chunk.metadata.extra = fields
                .into_iter()
                .filter(|(_, v)| !is_blank(v))
                .collect::<Map<String, Value>>();
        }
        chunk
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Catalog backend
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the backend is misconfigured or unreachable
    async fn search(&self, kind: CatalogKind, query: &str, limit: usize) -> Result<Vec<CatalogHit>>;
}

/// Input contract of `catalog_search`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogSearchInput {
    /// One to three sub-queries
    pub queries: Vec<String>,
    #[serde(default)]
    pub catalog: CatalogKind,
}

impl ValidateInput for CatalogSearchInput {
    fn validate(&self) -> Result<()> {
        validate_queries(&self.queries)
    }
}

/// `catalog_search` action
pub struct ShoppingSearchAction {
    backend: Arc<dyn CatalogSearch>,
    results_per_query: usize,
}

impl ShoppingSearchAction {
    pub fn new(backend: Arc<dyn CatalogSearch>, results_per_query: usize) -> Self {
        Self {
            backend,
            results_per_query,
        }
    }
}

#[async_trait]
impl Action for ShoppingSearchAction {
    type Input = CatalogSearchInput;
    type Output = SearchOutput;

    fn kind(&self) -> ActionKind {
        ActionKind::CatalogSearch
    }

    fn description(&self) -> &'static str {
        "Search public shopping or hotel listings"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "maxItems": crate::config::MAX_SUB_QUERIES,
                    "description": "Sub-queries to run against the catalog"
                },
                "catalog": {
                    "type": "string",
                    "enum": ["shopping", "hotels"],
                    "description": "Catalog to search (default: shopping)"
                }
            },
            "required": ["queries"],
            "additionalProperties": false
        })
    }

    fn enabled(&self, ctx: &RequestContext) -> bool {
        !ctx.personal_search
    }

    async fn execute(&self, input: CatalogSearchInput, ctx: &RequestContext) -> Result<SearchOutput> {
        ctx.check_cancelled()?;

        let backend = &self.backend;
        let kind = input.catalog;
        let limit = self.results_per_query;
        tracing::debug!(
            catalog.event = "search",
            catalog = %kind,
            queries = input.queries.len(),
            "Searching catalog"
        );

        let result = fan_out(
            ActionKind::CatalogSearch.as_str(),
            &input.queries,
            ctx,
            |query| async move {
                backend
                    .search(kind, &query, limit)
                    .await
                    .map(|hits| hits.into_iter().map(CatalogHit::into_chunk).collect::<Vec<_>>())
            },
        )
        .await?;

        Ok(result.into())
    }
}
