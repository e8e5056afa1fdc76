//! Search over files attached to the turn
//!
//! The action is enabled only when the request carries at least one file id.
//! The owning user is resolved from those ids; when no owner can be
//! established the action returns an empty result instead of failing.

use super::context::{Chunk, RequestContext};
use super::fanout::fan_out;
use super::{validate_queries, Action, ActionKind, SearchOutput, ValidateInput};
use crate::error::{ClonarError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One hit from the document index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl DocumentHit {
    fn into_chunk(self) -> Chunk {
        let mut chunk = Chunk::new(self.content);
        chunk.metadata.title = self.title;
        chunk.metadata.url = self.url;
        if let Some(summary) = self.summary.filter(|s| !s.trim().is_empty()) {
            chunk = chunk.with_extra("summary", Value::String(summary));
        }
        chunk
    }
}

/// Semantic search over one user's files
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the index cannot be queried
    async fn search_user_files(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<DocumentHit>>;
}

/// File id to owning user lookup
#[async_trait]
pub trait FileOwnership: Send + Sync {
    /// `Ok(None)` when the file is unknown
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup backend fails
    async fn owner_of(&self, file_id: &str) -> Result<Option<String>>;
}

/// Input contract of `uploads_search`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadsSearchInput {
    /// One to three sub-queries
    pub queries: Vec<String>,
}

impl ValidateInput for UploadsSearchInput {
    fn validate(&self) -> Result<()> {
        validate_queries(&self.queries)
    }
}

/// `uploads_search` action
pub struct UploadsSearchAction {
    documents: Arc<dyn DocumentSearch>,
    ownership: Arc<dyn FileOwnership>,
    results_per_query: usize,
}

impl UploadsSearchAction {
    pub fn new(
        documents: Arc<dyn DocumentSearch>,
        ownership: Arc<dyn FileOwnership>,
        results_per_query: usize,
    ) -> Self {
        Self {
            documents,
            ownership,
            results_per_query,
        }
    }

    /// First owner found among the request's file ids
    ///
    /// # Errors
    ///
    /// Returns `ClonarError::Cancelled` as soon as the turn is cancelled
    async fn resolve_owner(&self, ctx: &RequestContext) -> Result<Option<String>> {
        for file_id in &ctx.file_ids {
            ctx.check_cancelled()?;
            let lookup = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    tracing::warn!(uploads.event = "cancelled", "Owner lookup cancelled");
                    return Err(ClonarError::Cancelled.into());
                }
                lookup = self.ownership.owner_of(file_id) => lookup,
            };
            match lookup {
                Ok(Some(owner)) => return Ok(Some(owner)),
                Ok(None) => {
                    tracing::debug!(uploads.event = "unknown_file", file_id = %file_id, "No owner for file")
                }
                Err(e) => {
                    tracing::warn!(
                        uploads.event = "ownership_lookup_failed",
                        file_id = %file_id,
                        error = %e,
                        "File ownership lookup failed"
                    )
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Action for UploadsSearchAction {
    type Input = UploadsSearchInput;
    type Output = SearchOutput;

    fn kind(&self) -> ActionKind {
        ActionKind::UploadsSearch
    }

    fn description(&self) -> &'static str {
        "Search the files the user attached to this conversation turn"
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
                    "description": "Sub-queries to run against the attached files"
                }
            },
            "required": ["queries"],
            "additionalProperties": false
        })
    }

    fn enabled(&self, ctx: &RequestContext) -> bool {
        !ctx.file_ids.is_empty()
    }

    async fn execute(&self, input: UploadsSearchInput, ctx: &RequestContext) -> Result<SearchOutput> {
        ctx.check_cancelled()?;

        let Some(user_id) = self.resolve_owner(ctx).await? else {
            tracing::info!(
                uploads.event = "no_identity",
                files = ctx.file_ids.len(),
                "Could not establish file owner, returning no results"
            );
            return Ok(SearchOutput::default());
        };

        let documents = &self.documents;
        let user_id = user_id.as_str();
        let limit = self.results_per_query;
        let result = fan_out(
            ActionKind::UploadsSearch.as_str(),
            &input.queries,
            ctx,
            |query| async move {
                documents
                    .search_user_files(user_id, &query, limit)
                    .await
                    .map(|hits| hits.into_iter().map(DocumentHit::into_chunk).collect::<Vec<_>>())
            },
        )
        .await?;

        Ok(result.into())
    }
}
