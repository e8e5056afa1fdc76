//! Query plan data model
//!
//! [`QueryPlan`] is the single output of the planner. Vertical, intent and
//! time sensitivity are closed enums; per-vertical filters are a tagged enum
//! carried by each [`Candidate`].

use crate::config::MAX_SUB_QUERIES;
use crate::error::ClonarError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Retrieval domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vertical {
    /// Shopping
    Product,
    /// Lodging
    Hotel,
    /// Air travel
    Flight,
    /// Films and showtimes
    Movie,
    /// General knowledge
    Other,
}

impl Vertical {
    /// All verticals, in declaration order
    pub const ALL: [Vertical; 5] = [
        Vertical::Product,
        Vertical::Hotel,
        Vertical::Flight,
        Vertical::Movie,
        Vertical::Other,
    ];

    /// Lowercase name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Vertical::Product => "product",
            Vertical::Hotel => "hotel",
            Vertical::Flight => "flight",
            Vertical::Movie => "movie",
            Vertical::Other => "other",
        }
    }

    /// Lenient parse of model output ("hotels", "Shopping", "film", ...)
    ///
    /// Returns `None` for anything unrecognized.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "product" | "products" | "shopping" | "shop" => Some(Vertical::Product),
            "hotel" | "hotels" | "lodging" | "accommodation" | "accommodations" => {
                Some(Vertical::Hotel)
            }
            "flight" | "flights" | "air" | "airfare" => Some(Vertical::Flight),
            "movie" | "movies" | "film" | "films" | "cinema" => Some(Vertical::Movie),
            "other" | "general" | "knowledge" => Some(Vertical::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User goal within a vertical
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Explore options
    Browse,
    /// Weigh options against each other
    Compare,
    /// Purchase
    Buy,
    /// Reserve
    Book,
}

impl Intent {
    /// Lowercase name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Browse => "browse",
            Intent::Compare => "compare",
            Intent::Buy => "buy",
            Intent::Book => "book",
        }
    }

    /// Lenient parse of model output
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "browse" | "explore" | "search" | "research" => Some(Intent::Browse),
            "compare" | "comparison" => Some(Intent::Compare),
            "buy" | "purchase" | "shop" => Some(Intent::Buy),
            "book" | "reserve" | "booking" | "reservation" => Some(Intent::Book),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness requirement of the downstream retrieval path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSensitivity {
    /// Encyclopedic lookup is fine
    #[default]
    Timeless,
    /// Needs a fresh overview (prices, availability, schedules, news)
    TimeSensitive,
}

impl TimeSensitivity {
    /// Lenient parse of model output
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "timeless" => Some(TimeSensitivity::Timeless),
            "time_sensitive" | "timesensitive" | "fresh" => Some(TimeSensitivity::TimeSensitive),
            _ => None,
        }
    }
}

/// Planning strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Deterministic keyword rules, no model call
    Quick,
    /// Model classification plus deterministic post-processing
    Deep,
}

impl FromStr for PlanMode {
    type Err = ClonarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(PlanMode::Quick),
            "deep" => Ok(PlanMode::Deep),
            other => Err(ClonarError::Config(format!(
                "Invalid plan mode: {}. Must be one of: quick, deep",
                other
            ))),
        }
    }
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanMode::Quick => f.write_str("quick"),
            PlanMode::Deep => f.write_str("deep"),
        }
    }
}

/// Product search filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_min: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

/// Hotel search filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotelFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests: Option<u32>,
    /// Nightly budget ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
}

/// Flight search filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depart_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passengers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cabin: Option<String>,
}

/// Movie search filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
}

/// Vertical-specific filter payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vertical", rename_all = "snake_case")]
pub enum VerticalFilters {
    Product(ProductFilters),
    Hotel(HotelFilters),
    Flight(FlightFilters),
    Movie(MovieFilters),
}

impl VerticalFilters {
    /// Vertical this payload belongs to
    pub fn vertical(&self) -> Vertical {
        match self {
            VerticalFilters::Product(_) => Vertical::Product,
            VerticalFilters::Hotel(_) => Vertical::Hotel,
            VerticalFilters::Flight(_) => Vertical::Flight,
            VerticalFilters::Movie(_) => Vertical::Movie,
        }
    }

    /// Decode an untagged model payload for a known vertical
    ///
    /// Returns `None` for `Vertical::Other` or when the payload does not fit.
    pub fn from_value(vertical: Vertical, value: serde_json::Value) -> Option<Self> {
        let filters = match vertical {
            Vertical::Product => VerticalFilters::Product(serde_json::from_value(value).ok()?),
            Vertical::Hotel => VerticalFilters::Hotel(serde_json::from_value(value).ok()?),
            Vertical::Flight => VerticalFilters::Flight(serde_json::from_value(value).ok()?),
            Vertical::Movie => VerticalFilters::Movie(serde_json::from_value(value).ok()?),
            Vertical::Other => return None,
        };
        Some(filters)
    }
}

/// Alternate interpretation of the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub vertical: Vertical,
    pub intent: Intent,
    /// Higher is more likely
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<VerticalFilters>,
}

/// Named things found in the request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

impl ExtractedEntities {
    /// True when nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.locations.is_empty() && self.concepts.is_empty()
    }
}

/// A lexically ambiguous term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityInfo {
    pub term: String,
    #[serde(default)]
    pub interpretations: Vec<String>,
    /// Set only when the conversation makes one interpretation dominant
    #[serde(default)]
    pub resolved: Option<String>,
}

/// Resolution state of a deliberately unpinned slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Only the city is known; the concrete site (airport code, station) is open
    CityOnly,
    /// Nothing is pinned yet
    Unresolved,
}

impl SlotState {
    /// Lenient parse of model output
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "city_only" | "cityonly" | "city" => Some(SlotState::CityOnly),
            "unresolved" | "open" | "unknown" => Some(SlotState::Unresolved),
            _ => None,
        }
    }
}

/// A slot left open for post-retrieval alignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftConstraint {
    /// Slot name, e.g. "airport"
    pub slot: String,
    pub state: SlotState,
    /// What is known so far, e.g. the city
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Structured retrieval plan for one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub vertical: Vertical,
    pub intent: Intent,
    /// Non-empty canonical restatement of the request
    pub rewritten_prompt: String,
    /// Alternate interpretations, descending by score, never the primary pair
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference_context: Option<String>,
    /// Filters for the primary vertical
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<VerticalFilters>,
    /// Per-vertical slice of the utterance; present only for 2+ verticals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decomposed_context: Option<BTreeMap<Vertical, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<ExtractedEntities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguity: Option<AmbiguityInfo>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub search_queries: BTreeMap<Vertical, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_queries: BTreeMap<Vertical, Vec<String>>,
    pub time_sensitivity: TimeSensitivity,
    /// Constraints, most important first
    #[serde(default)]
    #[serde(deserialize_with = "null_as_default")]
    pub preference_priority: Vec<String>,
    #[serde(default)]
    pub soft_constraints: Vec<SoftConstraint>,
}

impl QueryPlan {
    /// Most conservative plan: general knowledge, browse
    pub fn conservative(rewritten_prompt: impl Into<String>) -> Self {
        Self {
            vertical: Vertical::Other,
            intent: Intent::Browse,
            rewritten_prompt: rewritten_prompt.into(),
            candidates: Vec::new(),
            preference_context: None,
            filters: None,
            decomposed_context: None,
            entities: None,
            ambiguity: None,
            search_queries: BTreeMap::new(),
            sub_queries: BTreeMap::new(),
            time_sensitivity: TimeSensitivity::Timeless,
            preference_priority: Vec::new(),
            soft_constraints: Vec::new(),
        }
    }

    /// True when the utterance was decomposed across verticals
    pub fn is_multi_vertical(&self) -> bool {
        self.decomposed_context
            .as_ref()
            .is_some_and(|slices| slices.len() >= 2)
    }

    /// Verticals involved, primary first
    pub fn verticals(&self) -> Vec<Vertical> {
        let mut verticals = vec![self.vertical];
        if let Some(slices) = &self.decomposed_context {
            verticals.extend(slices.keys().copied().filter(|v| *v != self.vertical));
        }
        verticals
    }

    /// Text retrieval for `vertical` should see
    ///
    /// The vertical's slice when decomposed, otherwise the rewritten prompt.
    pub fn context_for(&self, vertical: Vertical) -> &str {
        self.decomposed_context
            .as_ref()
            .and_then(|slices| slices.get(&vertical))
            .map(String::as_str)
            .unwrap_or(&self.rewritten_prompt)
    }

    /// Retrieval queries for `vertical`, at most [`MAX_SUB_QUERIES`]
    ///
    /// Prefers explicit sub-queries, then search queries, then the vertical's
    /// context.
    pub fn queries_for(&self, vertical: Vertical) -> Vec<String> {
        let explicit = self
            .sub_queries
            .get(&vertical)
            .filter(|queries| !queries.is_empty())
            .or_else(|| {
                self.search_queries
                    .get(&vertical)
                    .filter(|queries| !queries.is_empty())
            });

        match explicit {
            Some(queries) => queries.iter().take(MAX_SUB_QUERIES).cloned().collect(),
            None => vec![self.context_for(vertical).to_string()],
        }
    }

    /// Soft constraint for `slot`, if any
    pub fn soft_constraint(&self, slot: &str) -> Option<&SoftConstraint> {
        self.soft_constraints.iter().find(|c| c.slot == slot)
    }
}

/// Lenient shape of the model's plan JSON
///
/// Every field is optional and loosely typed; `planner::finalize` turns it
/// into a [`QueryPlan`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPlan {
    pub vertical: Option<String>,
    pub intent: Option<String>,
    pub rewritten_prompt: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub candidates: Vec<RawCandidate>,
    pub preference_context: Option<String>,
    pub filters: Option<serde_json::Value>,
    pub decomposed_context: Option<BTreeMap<String, String>>,
    pub entities: Option<ExtractedEntities>,
    pub ambiguity: Option<AmbiguityInfo>,
    #[serde(deserialize_with = "null_as_default")]
    pub search_queries: BTreeMap<String, Vec<String>>,
    #[serde(deserialize_with = "null_as_default")]
    pub sub_queries: BTreeMap<String, Vec<String>>,
    pub time_sensitivity: Option<String>,
    pub preference_priority: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub soft_constraints: Vec<RawSoftConstraint>,
}

/// Decode `null` as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lenient candidate shape
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCandidate {
    pub vertical: Option<String>,
    pub intent: Option<String>,
    pub score: Option<f64>,
    pub preference_context: Option<String>,
    pub filters: Option<serde_json::Value>,
}

/// Lenient soft constraint shape
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSoftConstraint {
    pub slot: Option<String>,
    pub state: Option<String>,
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_mode_from_str() {
        assert_eq!("quick".parse::<PlanMode>().unwrap(), PlanMode::Quick);
        assert_eq!(" Deep ".parse::<PlanMode>().unwrap(), PlanMode::Deep);
        assert!("fast".parse::<PlanMode>().is_err());
        assert_eq!(PlanMode::Quick.to_string(), "quick");
    }

    #[test]
    fn test_vertical_lenient_parse() {
        assert_eq!(Vertical::parse_lenient("Hotels"), Some(Vertical::Hotel));
        assert_eq!(Vertical::parse_lenient("shopping"), Some(Vertical::Product));
        assert_eq!(Vertical::parse_lenient("weather"), None);
    }

    #[test]
    fn test_time_sensitivity_serializes_snake_case() {
        let json = serde_json::to_string(&TimeSensitivity::TimeSensitive).unwrap();
        assert_eq!(json, "\"time_sensitive\"");
        assert_eq!(
            TimeSensitivity::parse_lenient("time-sensitive"),
            Some(TimeSensitivity::TimeSensitive)
        );
    }

    #[test]
    fn test_vertical_filters_tagged() {
        let filters = VerticalFilters::Hotel(HotelFilters {
            destination: Some("Tokyo".to_string()),
            amenities: vec!["pool".to_string()],
            ..HotelFilters::default()
        });
        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(json["vertical"], "hotel");
        assert_eq!(json["destination"], "Tokyo");

        let back: VerticalFilters = serde_json::from_value(json).unwrap();
        assert_eq!(back.vertical(), Vertical::Hotel);
    }

    #[test]
    fn test_vertical_filters_from_untagged_value() {
        let value = serde_json::json!({"origin": "SFO", "passengers": 2});
        let filters = VerticalFilters::from_value(Vertical::Flight, value).unwrap();
        match filters {
            VerticalFilters::Flight(f) => {
                assert_eq!(f.origin.as_deref(), Some("SFO"));
                assert_eq!(f.passengers, Some(2));
            }
            other => panic!("unexpected filters: {:?}", other),
        }
        assert!(VerticalFilters::from_value(Vertical::Other, serde_json::json!({})).is_none());
    }

    #[test]
    fn test_decomposed_context_serializes_with_vertical_keys() {
        let mut plan = QueryPlan::conservative("flights to Tokyo and a hotel");
        let mut slices = BTreeMap::new();
        slices.insert(Vertical::Flight, "flights to Tokyo".to_string());
        slices.insert(Vertical::Hotel, "a hotel".to_string());
        plan.decomposed_context = Some(slices);

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["decomposed_context"]["flight"], "flights to Tokyo");
        assert_eq!(json["decomposed_context"]["hotel"], "a hotel");
    }

    #[test]
    fn test_context_and_queries_for() {
        let mut plan = QueryPlan::conservative("flights to Tokyo and a hotel");
        plan.vertical = Vertical::Flight;
        let mut slices = BTreeMap::new();
        slices.insert(Vertical::Flight, "flights to Tokyo".to_string());
        slices.insert(Vertical::Hotel, "a hotel".to_string());
        plan.decomposed_context = Some(slices);
        plan.sub_queries.insert(
            Vertical::Hotel,
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
        );

        assert!(plan.is_multi_vertical());
        assert_eq!(plan.verticals(), vec![Vertical::Flight, Vertical::Hotel]);
        assert_eq!(plan.context_for(Vertical::Hotel), "a hotel");
        assert_eq!(plan.context_for(Vertical::Movie), "flights to Tokyo and a hotel");
        assert_eq!(plan.queries_for(Vertical::Hotel).len(), 3);
        assert_eq!(plan.queries_for(Vertical::Flight), vec!["flights to Tokyo"]);
    }

    #[test]
    fn test_raw_plan_tolerates_missing_fields() {
        let raw: RawPlan = serde_json::from_str(r#"{"vertical": "hotel"}"#).unwrap();
        assert_eq!(raw.vertical.as_deref(), Some("hotel"));
        assert!(raw.candidates.is_empty());
        assert!(raw.decomposed_context.is_none());
    }
}
