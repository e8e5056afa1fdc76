//! Query planning
//!
//! [`QueryPlanner`] turns one utterance (plus conversation history) into
//! exactly one [`QueryPlan`]. Quick mode runs the keyword rules in
//! [`heuristics`]; deep mode asks the completion provider for a JSON plan.
//! Both paths end in [`finalize`], which enforces the plan invariants and
//! fills in what the classifier left out.
//!
//! Planning never fails: provider errors, timeouts and unparseable replies
//! degrade to a conservative (other, browse) plan.

pub mod heuristics;
pub mod relax;
pub mod types;

pub use relax::{relax_preferences, relaxation_steps, RelaxationOutcome};
pub use types::{
    AmbiguityInfo, Candidate, ExtractedEntities, FlightFilters, HotelFilters, Intent,
    MovieFilters, PlanMode, ProductFilters, QueryPlan, RawCandidate, RawPlan, RawSoftConstraint,
    SlotState, SoftConstraint, TimeSensitivity, Vertical, VerticalFilters,
};

use crate::config::{PlannerConfig, MAX_SUB_QUERIES};
use crate::error::{ClonarError, Result};
use crate::prompts::build_classify_messages;
use crate::providers::{CompletionOptions, Message, Provider};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Slot name of the airport soft constraint
pub const AIRPORT_SLOT: &str = "airport";

/// Produces query plans
pub struct QueryPlanner {
    provider: Arc<dyn Provider>,
    config: PlannerConfig,
    default_mode: PlanMode,
}

impl QueryPlanner {
    /// Create a planner
    ///
    /// An unparseable `config.default_mode` falls back to deep mode.
    pub fn new(provider: Arc<dyn Provider>, config: PlannerConfig) -> Self {
        let default_mode = config.default_mode.parse().unwrap_or(PlanMode::Deep);
        Self {
            provider,
            config,
            default_mode,
        }
    }

    /// Mode used when `plan` is called without one
    pub fn default_mode(&self) -> PlanMode {
        self.default_mode
    }

    /// Plan one utterance
    ///
    /// # Arguments
    ///
    /// * `query` - The (already repaired) utterance
    /// * `history` - Prior conversation turns, oldest first
    /// * `mode` - Planning strategy; `None` uses the configured default
    ///
    /// # Returns
    ///
    /// Exactly one plan. Classification failures yield the conservative plan.
    pub async fn plan(&self, query: &str, history: &[Message], mode: Option<PlanMode>) -> QueryPlan {
        let mode = mode.unwrap_or(self.default_mode);
        tracing::debug!(planner.event = "start", mode = %mode, "Planning query");

        let plan = match mode {
            PlanMode::Quick => quick_plan(query, history),
            PlanMode::Deep => match self.deep_plan(query, history).await {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::warn!(
                        planner.event = "classification_failed",
                        error = %e,
                        "Deep planning failed, using conservative plan"
                    );
                    conservative_plan(query)
                }
            },
        };

        tracing::info!(
            planner.event = "planned",
            mode = %mode,
            vertical = %plan.vertical,
            intent = %plan.intent,
            multi_vertical = plan.is_multi_vertical(),
            candidates = plan.candidates.len(),
            "Query planned"
        );
        plan
    }

    async fn deep_plan(&self, query: &str, history: &[Message]) -> Result<QueryPlan> {
        let messages = build_classify_messages(query, history, self.config.history_window);
        let options =
            CompletionOptions::deterministic(self.config.temperature, self.config.max_tokens)
                .with_json();

        let reply = tokio::time::timeout(
            self.config.timeout(),
            self.provider.complete_text(&messages, &options),
        )
        .await
        .map_err(|_| {
            ClonarError::Provider(format!(
                "classification timed out after {}s",
                self.config.timeout_seconds
            ))
        })??;

        let raw = parse_plan_reply(&reply)?;
        Ok(finalize(from_raw(raw, query), query, history))
    }
}

/// Conservative plan for `query`: other, browse, keyword time sensitivity
pub fn conservative_plan(query: &str) -> QueryPlan {
    let rewritten = heuristics::rewrite(query);
    let mut plan = QueryPlan::conservative(rewritten);
    plan.time_sensitivity = heuristics::detect_time_sensitivity(query, Vertical::Other);
    plan
}

/// Extract and decode the plan JSON from a model reply
///
/// Tolerates code fences and prose around the outermost JSON object.
///
/// # Errors
///
/// Returns `ClonarError::Provider` when no JSON object is present and
/// `ClonarError::Serialization` when it does not decode.
pub fn parse_plan_reply(reply: &str) -> Result<RawPlan> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => {
            return Err(
                ClonarError::Provider("classification reply has no JSON object".to_string())
                    .into(),
            )
        }
    };
    let raw: RawPlan = serde_json::from_str(json).map_err(ClonarError::from)?;
    Ok(raw)
}

/// Keyword-only plan
///
/// The vertical with the most keyword hits is primary (ties go to the one
/// mentioned first); every other detected vertical becomes a candidate scored
/// by its share of hits.
pub fn quick_plan(query: &str, history: &[Message]) -> QueryPlan {
    let rewritten = heuristics::rewrite(query);
    let slices = heuristics::decompose(&rewritten);

    let mut primary: Option<&heuristics::VerticalSlice> = None;
    for slice in &slices {
        if primary.map_or(true, |best| slice.hits > best.hits) {
            primary = Some(slice);
        }
    }

    let (vertical, primary_text) = match primary {
        Some(slice) => (slice.vertical, slice.text.clone()),
        None => (Vertical::Other, rewritten.clone()),
    };

    let mut plan = QueryPlan::conservative(rewritten.clone());
    plan.vertical = vertical;
    plan.intent = heuristics::detect_intent(&primary_text);
    plan.time_sensitivity = heuristics::detect_time_sensitivity(&rewritten, vertical);

    let total_hits: usize = slices.iter().map(|s| s.hits).sum();
    for slice in slices.iter().filter(|s| s.vertical != vertical) {
        let score = if total_hits == 0 {
            0.0
        } else {
            slice.hits as f64 / total_hits as f64
        };
        plan.candidates.push(Candidate {
            vertical: slice.vertical,
            intent: heuristics::detect_intent(&slice.text),
            score,
            preference_context: None,
            filters: None,
        });
    }

    if slices.len() >= 2 {
        plan.decomposed_context = Some(
            slices
                .iter()
                .map(|slice| (slice.vertical, slice.text.clone()))
                .collect(),
        );
    }

    for slice in &slices {
        plan.search_queries
            .insert(slice.vertical, vec![slice.text.clone()]);
    }

    if plan.intent == Intent::Compare {
        let items = heuristics::comparison_sub_queries(&primary_text);
        if !items.is_empty() {
            plan.sub_queries.insert(vertical, items);
        }
    }

    finalize(plan, query, history)
}

/// Convert a lenient model plan into a typed plan
///
/// Unknown verticals become `Other`; a missing intent falls back to keyword
/// detection; a missing time sensitivity falls back to keyword detection.
fn from_raw(raw: RawPlan, query: &str) -> QueryPlan {
    let vertical = raw
        .vertical
        .as_deref()
        .and_then(Vertical::parse_lenient)
        .unwrap_or(Vertical::Other);
    let intent = raw
        .intent
        .as_deref()
        .and_then(Intent::parse_lenient)
        .unwrap_or_else(|| heuristics::detect_intent(query));
    let rewritten = raw
        .rewritten_prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| heuristics::rewrite(query));
    let time_sensitivity = raw
        .time_sensitivity
        .as_deref()
        .and_then(TimeSensitivity::parse_lenient)
        .unwrap_or_else(|| heuristics::detect_time_sensitivity(&rewritten, vertical));

    let candidates = raw
        .candidates
        .into_iter()
        .filter_map(|c| {
            let vertical = c.vertical.as_deref().and_then(Vertical::parse_lenient)?;
            Some(Candidate {
                vertical,
                intent: c
                    .intent
                    .as_deref()
                    .and_then(Intent::parse_lenient)
                    .unwrap_or(Intent::Browse),
                score: c.score.unwrap_or(0.0),
                preference_context: non_blank(c.preference_context),
                filters: c
                    .filters
                    .and_then(|value| VerticalFilters::from_value(vertical, value)),
            })
        })
        .collect();

    let decomposed_context = raw.decomposed_context.map(|slices| {
        slices
            .into_iter()
            .filter_map(|(key, text)| Some((Vertical::parse_lenient(&key)?, text)))
            .collect::<BTreeMap<_, _>>()
    });

    let soft_constraints = raw
        .soft_constraints
        .into_iter()
        .filter_map(|c| {
            let slot = non_blank(c.slot)?.to_lowercase();
            let value = non_blank(c.value);
            let state = c
                .state
                .as_deref()
                .and_then(SlotState::parse_lenient)
                .unwrap_or(if value.is_some() {
                    SlotState::CityOnly
                } else {
                    SlotState::Unresolved
                });
            Some(SoftConstraint { slot, state, value })
        })
        .collect();

    QueryPlan {
        vertical,
        intent,
        rewritten_prompt: rewritten,
        candidates,
        preference_context: non_blank(raw.preference_context),
        filters: raw
            .filters
            .and_then(|value| VerticalFilters::from_value(vertical, value)),
        decomposed_context,
        entities: raw.entities,
        ambiguity: raw.ambiguity,
        search_queries: parse_query_map(raw.search_queries),
        sub_queries: parse_query_map(raw.sub_queries),
        time_sensitivity,
        preference_priority: raw.preference_priority,
        soft_constraints,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_query_map(raw: BTreeMap<String, Vec<String>>) -> BTreeMap<Vertical, Vec<String>> {
    let mut map: BTreeMap<Vertical, Vec<String>> = BTreeMap::new();
    for (key, queries) in raw {
        if let Some(vertical) = Vertical::parse_lenient(&key) {
            map.entry(vertical).or_default().extend(queries);
        }
    }
    map
}

/// Enforce plan invariants and fill gaps with keyword rules
///
/// - `rewritten_prompt` is non-empty
/// - candidates are finite-scored, sorted by descending score, unique per
///   (vertical, intent) and never repeat the primary pair
/// - `decomposed_context` is present only with 2+ non-empty slices
/// - query lists hold at most [`MAX_SUB_QUERIES`] non-blank entries
/// - an airport mention without a site code yields a soft constraint
///
/// Missing filters, entities, ambiguity and preference priority are derived
/// from the utterance.
pub fn finalize(mut plan: QueryPlan, query: &str, history: &[Message]) -> QueryPlan {
    if plan.rewritten_prompt.trim().is_empty() {
        plan.rewritten_prompt = heuristics::rewrite(query);
    } else {
        plan.rewritten_prompt = plan.rewritten_prompt.trim().to_string();
    }
    let text = plan.rewritten_prompt.clone();

    normalize_candidates(&mut plan);
    normalize_decomposition(&mut plan, &text);

    for queries in [&mut plan.search_queries, &mut plan.sub_queries] {
        for list in queries.values_mut() {
            let mut seen = HashSet::new();
            list.retain(|q| !q.trim().is_empty() && seen.insert(q.trim().to_lowercase()));
            for q in list.iter_mut() {
                *q = q.trim().to_string();
            }
            list.truncate(MAX_SUB_QUERIES);
        }
        queries.retain(|_, list| !list.is_empty());
    }

    let mut seen = HashSet::new();
    plan.preference_priority = plan
        .preference_priority
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty() && seen.insert(p.to_lowercase()))
        .collect();
    if plan.preference_priority.is_empty() {
        plan.preference_priority = heuristics::extract_constraints(&text);
    }

    let city = known_city(&plan, &text, history);

    if plan
        .filters
        .as_ref()
        .is_some_and(|f| f.vertical() != plan.vertical)
    {
        plan.filters = None;
    }
    if plan.filters.is_none() {
        plan.filters =
            heuristics::filters_for(plan.vertical, plan.context_for(plan.vertical), city.as_deref());
    }
    let contexts: Vec<String> = plan
        .candidates
        .iter()
        .map(|c| plan.context_for(c.vertical).to_string())
        .collect();
    for (candidate, context) in plan.candidates.iter_mut().zip(contexts) {
        if candidate.filters.is_none() {
            candidate.filters = heuristics::filters_for(candidate.vertical, &context, city.as_deref());
        }
    }

    let mut slots = HashSet::new();
    plan.soft_constraints
        .retain(|c| !c.slot.is_empty() && slots.insert(c.slot.clone()));
    if plan.soft_constraint(AIRPORT_SLOT).is_none() {
        if let Some(constraint) = heuristics::detect_airport_constraint(&text, city.as_deref()) {
            plan.soft_constraints.push(constraint);
        }
    }

    plan.ambiguity = match plan.ambiguity.take() {
        Some(info) => sanitize_ambiguity(info, &text, history),
        None => heuristics::detect_ambiguity(&text, history),
    };

    if plan.entities.as_ref().map_or(true, ExtractedEntities::is_empty) {
        let entities = heuristics::extract_entities(&text);
        plan.entities = (!entities.is_empty()).then_some(entities);
    }

    plan
}

fn normalize_candidates(plan: &mut QueryPlan) {
    let primary = (plan.vertical, plan.intent);
    plan.candidates
        .retain(|c| c.score.is_finite() && (c.vertical, c.intent) != primary);
    plan.candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut seen = HashSet::new();
    plan.candidates.retain(|c| seen.insert((c.vertical, c.intent)));
}

fn normalize_decomposition(plan: &mut QueryPlan, text: &str) {
    if let Some(slices) = plan.decomposed_context.as_mut() {
        slices.retain(|_, slice| !slice.trim().is_empty());
        for slice in slices.values_mut() {
            *slice = slice.trim().to_string();
        }
    }

    if plan.decomposed_context.is_none() {
        let slices = heuristics::decompose(text);
        if slices.len() >= 2 && slices.iter().any(|s| s.vertical == plan.vertical) {
            plan.decomposed_context = Some(
                slices
                    .into_iter()
                    .map(|slice| (slice.vertical, slice.text))
                    .collect(),
            );
        }
    }

    if plan
        .decomposed_context
        .as_ref()
        .is_some_and(|slices| slices.len() < 2)
    {
        plan.decomposed_context = None;
    }
}

/// City used for destination filters and the airport constraint
///
/// Flight destination first, then any destination in the utterance, then the
/// most recent one in the history.
fn known_city(plan: &QueryPlan, text: &str, history: &[Message]) -> Option<String> {
    let flight_destination = plan
        .filters
        .iter()
        .chain(plan.candidates.iter().filter_map(|c| c.filters.as_ref()))
        .find_map(|filters| match filters {
            VerticalFilters::Flight(flight) => flight.destination.clone(),
            _ => None,
        });

    flight_destination
        .or_else(|| heuristics::find_destination(text))
        .or_else(|| heuristics::destination_from_history(history))
}

/// Keep a model ambiguity only if well formed
///
/// A resolution that is not one of the listed interpretations is discarded,
/// and dictionary cues are consulted when the model left it unresolved.
fn sanitize_ambiguity(
    mut info: AmbiguityInfo,
    text: &str,
    history: &[Message],
) -> Option<AmbiguityInfo> {
    info.term = info.term.trim().to_string();
    if info.term.is_empty() {
        return heuristics::detect_ambiguity(text, history);
    }

    info.interpretations.retain(|i| !i.trim().is_empty());
    if let Some(resolved) = &info.resolved {
        if !info.interpretations.iter().any(|i| i == resolved) {
            info.resolved = None;
        }
    }

    if info.resolved.is_none() {
        let mut context = text.to_string();
        for message in history {
            context.push(' ');
            context.push_str(&message.content);
        }
        info = heuristics::resolve_ambiguity(info, &context);
    }
    Some(info)
}
