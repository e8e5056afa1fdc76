//! Retrieval actions
//!
//! An [`Action`] is a named, typed retrieval capability: it declares an input
//! contract, decides per request whether it is enabled and executes against
//! a [`RequestContext`]. Actions are registered once at startup in an
//! [`ActionRegistry`] keyed by [`ActionKind`] and invoked through an
//! [`ActionRunner`], which validates input before anything executes.

pub mod catalog;
pub mod context;
pub mod fanout;
pub mod metrics;
pub mod registry_builder;
pub mod serpapi;
pub mod uploads;

pub use catalog::{CatalogKind, CatalogSearch, CatalogSearchInput, ShoppingSearchAction};
pub use context::{
    Block, BlockSink, ChannelSink, Chunk, ChunkMetadata, NullSink, RequestContext, SourceItem,
};
pub use fanout::{fan_out, merge_by_source, FanOutResult};
pub use registry_builder::ActionRegistryBuilder;
pub use uploads::{DocumentHit, DocumentSearch, FileOwnership, UploadsSearchAction, UploadsSearchInput};

use crate::config::MAX_SUB_QUERIES;
use crate::error::{ClonarError, Result};
use async_trait::async_trait;
use self::metrics::ActionMetrics;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Registered action names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Search inside files the user attached to the turn
    UploadsSearch,
    /// Search public shopping and hotel catalogs
    CatalogSearch,
}

impl ActionKind {
    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::UploadsSearch => "uploads_search",
            ActionKind::CatalogSearch => "catalog_search",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ClonarError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "uploads_search" => Ok(ActionKind::UploadsSearch),
            "catalog_search" => Ok(ActionKind::CatalogSearch),
            other => Err(ClonarError::UnknownAction(other.to_string())),
        }
    }
}

/// Semantic checks beyond what deserialization enforces
pub trait ValidateInput {
    /// # Errors
    ///
    /// Returns `ClonarError::InvalidInput` describing the first violation
    fn validate(&self) -> Result<()>;
}

/// Validate a sub-query list: 1 to [`MAX_SUB_QUERIES`] non-blank entries
///
/// # Errors
///
/// Returns `ClonarError::InvalidInput` when the list is empty, too long or
/// contains a blank query
pub fn validate_queries(queries: &[String]) -> Result<()> {
    if queries.is_empty() {
        return Err(ClonarError::InvalidInput("queries must not be empty".to_string()).into());
    }
    if queries.len() > MAX_SUB_QUERIES {
        return Err(ClonarError::InvalidInput(format!(
            "at most {} queries allowed, got {}",
            MAX_SUB_QUERIES,
            queries.len()
        ))
        .into());
    }
    if let Some(index) = queries.iter().position(|q| q.trim().is_empty()) {
        return Err(ClonarError::InvalidInput(format!("query {} is blank", index)).into());
    }
    Ok(())
}

/// Typed retrieval action
///
/// # Examples
///
/// ```
/// use clonar::actions::{Action, ActionKind, RequestContext, ValidateInput};
/// use clonar::error::Result;
/// use async_trait::async_trait;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct EchoInput {
///     text: String,
/// }
///
/// impl ValidateInput for EchoInput {
///     fn validate(&self) -> Result<()> {
///         Ok(())
///     }
/// }
///
/// struct Echo;
///
/// #[async_trait]
/// impl Action for Echo {
///     type Input = EchoInput;
///     type Output = String;
///
///     fn kind(&self) -> ActionKind {
///         ActionKind::CatalogSearch
///     }
///     fn description(&self) -> &'static str {
///         "Echo the input"
///     }
///     fn input_schema(&self) -> serde_json::Value {
///         serde_json::json!({"type": "object"})
///     }
///     fn enabled(&self, _ctx: &RequestContext) -> bool {
///         true
///     }
///     async fn execute(&self, input: EchoInput, _ctx: &RequestContext) -> Result<String> {
///         Ok(input.text)
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync {
    /// Input contract
    type Input: DeserializeOwned + ValidateInput + Send;
    /// Execution result
    type Output: Serialize + Send;

    /// Registry key
    fn kind(&self) -> ActionKind;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON schema of [`Self::Input`]
    fn input_schema(&self) -> Value;

    /// Whether the action may run for this request
    fn enabled(&self, ctx: &RequestContext) -> bool;

    /// Run the action
    ///
    /// # Errors
    ///
    /// Returns `ClonarError::Cancelled` when the turn is cancelled.
    /// Collaborator failures are handled inside the action.
    async fn execute(&self, input: Self::Input, ctx: &RequestContext) -> Result<Self::Output>;
}

/// Type-erased action, as stored in the registry
#[async_trait]
pub trait DynAction: Send + Sync {
    fn kind(&self) -> ActionKind;

    fn description(&self) -> &'static str;

    fn input_schema(&self) -> Value;

    fn enabled(&self, ctx: &RequestContext) -> bool;

    /// Decode and validate input without executing anything
    ///
    /// # Errors
    ///
    /// Returns `ClonarError::InvalidInput` when the input does not fit the
    /// contract
    fn validate(&self, input: &Value) -> Result<()>;

    /// Decode, execute and encode the result
    async fn run(&self, input: Value, ctx: &RequestContext) -> Result<Value>;
}

fn decode_input<I: DeserializeOwned + ValidateInput>(input: Value) -> Result<I> {
    let decoded: I = serde_json::from_value(input)
        .map_err(|e| ClonarError::InvalidInput(e.to_string()))?;
    decoded.validate()?;
    Ok(decoded)
}

#[async_trait]
impl<A: Action> DynAction for A {
    fn kind(&self) -> ActionKind {
        Action::kind(self)
    }

    fn description(&self) -> &'static str {
        Action::description(self)
    }

    fn input_schema(&self) -> Value {
        Action::input_schema(self)
    }

    fn enabled(&self, ctx: &RequestContext) -> bool {
        Action::enabled(self, ctx)
    }

    fn validate(&self, input: &Value) -> Result<()> {
        decode_input::<A::Input>(input.clone()).map(|_| ())
    }

    async fn run(&self, input: Value, ctx: &RequestContext) -> Result<Value> {
        let input = decode_input::<A::Input>(input)?;
        let output = self.execute(input, ctx).await?;
        Ok(serde_json::to_value(output)?)
    }
}

/// Output of the search actions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutput {
    /// Merged results
    pub results: Vec<Chunk>,
    /// Sub-queries that failed and contributed nothing
    #[serde(default)]
    pub failed_queries: usize,
}

impl From<FanOutResult> for SearchOutput {
    fn from(result: FanOutResult) -> Self {
        Self {
            results: result.chunks,
            failed_queries: result.failed,
        }
    }
}

/// Process-wide action table
#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<ActionKind, Arc<dyn DynAction>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed action
    ///
    /// # Errors
    ///
    /// Returns `ClonarError::DuplicateAction` if the kind is already taken
    pub fn register<A: Action + 'static>(&mut self, action: A) -> Result<()> {
        self.register_dyn(Arc::new(action))
    }

    /// Register a type-erased action
    ///
    /// # Errors
    ///
    /// Returns `ClonarError::DuplicateAction` if the kind is already taken
    pub fn register_dyn(&mut self, action: Arc<dyn DynAction>) -> Result<()> {
        let kind = action.kind();
        if self.actions.contains_key(&kind) {
            return Err(ClonarError::DuplicateAction(kind.to_string()).into());
        }
        tracing::debug!(registry.event = "register", action = %kind, "Registered action");
        self.actions.insert(kind, action);
        Ok(())
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn DynAction>> {
        self.actions.get(&kind).cloned()
    }

    /// Look up by wire name
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn DynAction>> {
        name.parse::<ActionKind>().ok().and_then(|kind| self.get(kind))
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        self.actions.keys().copied().collect()
    }

    /// Actions enabled for this request
    pub fn enabled_for(&self, ctx: &RequestContext) -> Vec<ActionKind> {
        self.actions
            .iter()
            .filter(|(_, action)| action.enabled(ctx))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Name, description and input schema of every action
    pub fn definitions(&self) -> Vec<Value> {
        self.actions
            .iter()
            .map(|(kind, action)| {
                serde_json::json!({
                    "name": kind.as_str(),
                    "description": action.description(),
                    "parameters": action.input_schema(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Invokes registered actions for a request
#[derive(Clone)]
pub struct ActionRunner {
    registry: Arc<ActionRegistry>,
}

impl ActionRunner {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Invoke an action by name
    ///
    /// Input is validated before anything else; invalid input never reaches
    /// `execute`. Disabled actions are rejected without running.
    ///
    /// # Arguments
    ///
    /// * `name` - Action wire name
    /// * `input` - Caller-supplied input
    /// * `ctx` - Request context
    ///
    /// # Returns
    ///
    /// The action's output as JSON
    ///
    /// # Errors
    ///
    /// - `ClonarError::UnknownAction` for an unregistered name
    /// - `ClonarError::InvalidInput` when validation fails
    /// - `ClonarError::ActionDisabled` when `enabled` is false
    /// - `ClonarError::Cancelled` when the turn is cancelled
    pub async fn invoke(&self, name: &str, input: Value, ctx: &RequestContext) -> Result<Value> {
        let action = self
            .registry
            .get_by_name(name)
            .ok_or_else(|| ClonarError::UnknownAction(name.to_string()))?;
        let kind = action.kind();
        let metrics = ActionMetrics::new(kind.as_str());

        if let Err(e) = action.validate(&input) {
            tracing::warn!(action.event = "invalid_input", action = %kind, error = %e, "Rejected action input");
            metrics.record_error("invalid_input");
            return Err(e);
        }

        if !action.enabled(ctx) {
            tracing::debug!(action.event = "disabled", action = %kind, "Action not enabled for request");
            metrics.record_error("disabled");
            return Err(ClonarError::ActionDisabled(kind.to_string()).into());
        }

        if let Err(e) = ctx.check_cancelled() {
            metrics.record_error("cancelled");
            return Err(e);
        }

        tracing::info!(action.event = "start", action = %kind, "Executing action");
        match action.run(input, ctx).await {
            Ok(output) => {
                let results = output
                    .get("results")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                let status = if results == 0 { "empty" } else { "success" };
                metrics.record_completion(results, status);
                tracing::info!(
                    action.event = "complete",
                    action = %kind,
                    results,
                    duration_ms = metrics.elapsed().as_millis() as u64,
                    "Action complete"
                );
                Ok(output)
            }
            Err(e) if ClonarError::is_cancellation(&e) => {
                tracing::info!(action.event = "cancelled", action = %kind, "Action cancelled");
                metrics.record_error("cancelled");
                Err(e)
            }
            Err(e) => {
                tracing::warn!(action.event = "failed", action = %kind, error = %e, "Action failed");
                metrics.record_error("execution");
                Err(e)
            }
        }
    }

    /// Invoke every action enabled for the request with the same input
    ///
    /// Runs sequentially in registry order and stops at the first
    /// cancellation. Other failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `ClonarError::Cancelled` when the turn is cancelled
    pub async fn invoke_enabled(
        &self,
        input: &Value,
        ctx: &RequestContext,
    ) -> Result<Vec<(ActionKind, Value)>> {
        let mut outputs = Vec::new();
        for kind in self.registry.enabled_for(ctx) {
            match self.invoke(kind.as_str(), input.clone(), ctx).await {
                Ok(output) => outputs.push((kind, output)),
                Err(e) if ClonarError::is_cancellation(&e) => return Err(e),
                Err(e) => {
                    tracing::warn!(action.event = "skipped", action = %kind, error = %e, "Skipping failed action")
                }
            }
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize)]
    struct CountInput {
        queries: Vec<String>,
    }

    impl ValidateInput for CountInput {
        fn validate(&self) -> Result<()> {
            validate_queries(&self.queries)
        }
    }

    /// Action that counts executions
    #[derive(Default)]
    struct CountingAction {
        executions: Arc<AtomicUsize>,
        only_with_files: bool,
    }

    #[async_trait]
    impl Action for CountingAction {
        type Input = CountInput;
        type Output = SearchOutput;

        fn kind(&self) -> ActionKind {
            ActionKind::UploadsSearch
        }

        fn description(&self) -> &'static str {
            "Counts executions"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object", "required": ["queries"]})
        }

        fn enabled(&self, ctx: &RequestContext) -> bool {
            !self.only_with_files || !ctx.file_ids.is_empty()
        }

        async fn execute(&self, input: CountInput, ctx: &RequestContext) -> Result<SearchOutput> {
            ctx.check_cancelled()?;
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(SearchOutput {
                results: input.queries.into_iter().map(Chunk::new).collect(),
                failed_queries: 0,
            })
        }
    }

    fn runner_with(action: CountingAction) -> ActionRunner {
        let mut registry = ActionRegistry::new();
        registry.register(action).unwrap();
        ActionRunner::new(Arc::new(registry))
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Arc::new(NullSink))
    }

    #[test]
    fn test_action_kind_round_trip_names() {
        assert_eq!("catalog_search".parse::<ActionKind>().unwrap(), ActionKind::CatalogSearch);
        assert!("web_search".parse::<ActionKind>().is_err());
        assert_eq!(ActionKind::UploadsSearch.to_string(), "uploads_search");
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ActionRegistry::new();
        registry.register(CountingAction::default()).unwrap();
        let err = registry.register(CountingAction::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClonarError>(),
            Some(ClonarError::DuplicateAction(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_definitions() {
        let mut registry = ActionRegistry::new();
        registry.register(CountingAction::default()).unwrap();
        let defs = registry.definitions();
        assert_eq!(defs[0]["name"], "uploads_search");
        assert_eq!(defs[0]["parameters"]["required"][0], "queries");
    }

    #[tokio::test]
    async fn test_invalid_input_never_executes() {
        let executions = Arc::new(AtomicUsize::new(0));
        let runner = runner_with(CountingAction {
            executions: executions.clone(),
            only_with_files: false,
        });

        for input in [
            serde_json::json!({"queries": []}),
            serde_json::json!({"queries": ["a", "b", "c", "d"]}),
            serde_json::json!({"queries": ["ok", "  "]}),
            serde_json::json!({"query": "wrong field"}),
        ] {
            let err = runner.invoke("uploads_search", input, &ctx()).await.unwrap_err();
            assert!(ClonarError::is_invalid_input(&err));
        }
        assert_eq!(executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_action_never_executes() {
        let executions = Arc::new(AtomicUsize::new(0));
        let runner = runner_with(CountingAction {
            executions: executions.clone(),
            only_with_files: true,
        });

        let err = runner
            .invoke("uploads_search", serde_json::json!({"queries": ["a"]}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClonarError>(),
            Some(ClonarError::ActionDisabled(_))
        ));
        assert_eq!(executions.load(Ordering::SeqCst), 0);

        let with_files = ctx().with_file_ids(vec!["f1".to_string()]);
        let output = runner
            .invoke("uploads_search", serde_json::json!({"queries": ["a"]}), &with_files)
            .await
            .unwrap();
        assert_eq!(output["results"][0]["content"], "a");
    }

    #[tokio::test]
    async fn test_cancelled_is_distinct_from_invalid() {
        let executions = Arc::new(AtomicUsize::new(0));
        let runner = runner_with(CountingAction {
            executions: executions.clone(),
            only_with_files: false,
        });
        let ctx = ctx();
        ctx.cancel.cancel();

        let err = runner
            .invoke("uploads_search", serde_json::json!({"queries": ["a"]}), &ctx)
            .await
            .unwrap_err();
        assert!(ClonarError::is_cancellation(&err));
        assert!(!ClonarError::is_invalid_input(&err));
        assert_eq!(executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let runner = ActionRunner::new(Arc::new(ActionRegistry::new()));
        let err = runner
            .invoke("web_search", serde_json::json!({}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClonarError>(),
            Some(ClonarError::UnknownAction(_))
        ));
    }

    #[tokio::test]
    async fn test_invoke_enabled_skips_disabled() {
        let runner = runner_with(CountingAction {
            executions: Arc::new(AtomicUsize::new(0)),
            only_with_files: true,
        });
        let outputs = runner
            .invoke_enabled(&serde_json::json!({"queries": ["a"]}), &ctx())
            .await
            .unwrap();
        assert!(outputs.is_empty());
    }
}
