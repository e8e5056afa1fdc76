//! End-to-end: repair, plan, then retrieve through the action runner

use async_trait::async_trait;
use clonar::actions::catalog::{CatalogHit, HotelItem};
use clonar::actions::{
    ActionKind, ActionRegistryBuilder, ActionRunner, Block, CatalogKind, CatalogSearch,
    ChannelSink, RequestContext, SearchOutput,
};
use clonar::config::{ActionsConfig, NormalizerConfig, PlannerConfig};
use clonar::error::Result;
use clonar::normalizer::QueryNormalizer;
use clonar::planner::{PlanMode, QueryPlanner, SlotState, Vertical, AIRPORT_SLOT};
use clonar::providers::Message;
use std::sync::{Arc, Mutex};

mod common;
use common::ScriptedProvider;

const PLAN_REPLY: &str = r#"{
  "vertical": "flight",
  "intent": "browse",
  "rewritten_prompt": "flights to Tokyo and a hotel near the airport",
  "decomposed_context": {
    "flight": "flights to Tokyo",
    "hotel": "a hotel near the airport"
  },
  "sub_queries": {
    "hotel": ["hotels near Tokyo airport", "airport hotels Tokyo"]
  },
  "time_sensitivity": "time_sensitive"
}"#;

struct RecordingCatalog {
    queries: Mutex<Vec<(CatalogKind, String)>>,
}

#[async_trait]
impl CatalogSearch for RecordingCatalog {
    async fn search(&self, kind: CatalogKind, query: &str, _limit: usize) -> Result<Vec<CatalogHit>> {
        self.queries.lock().unwrap().push((kind, query.to_string()));
        Ok(vec![CatalogHit::Hotel(HotelItem {
            name: "Haneda Excel Hotel".to_string(),
            link: "https://hotels.test/haneda-excel".to_string(),
            city: "Tokyo".to_string(),
            ..HotelItem::default()
        })])
    }
}

#[tokio::test]
async fn test_deep_pipeline_multi_vertical() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Some("flights to Tokyo and a hotel near the airport"),
        Some(PLAN_REPLY),
    ]));

    let normalizer = QueryNormalizer::new(provider.clone(), NormalizerConfig::default());
    let repaired = normalizer
        .repair("flites to Tokio and a hotle near the airport", "travel")
        .await;
    assert_eq!(repaired, "flights to Tokyo and a hotel near the airport");

    let planner = QueryPlanner::new(provider.clone(), PlannerConfig::default());
    let plan = planner.plan(&repaired, &[], Some(PlanMode::Deep)).await;
    assert_eq!(provider.call_count(), 2);

    assert_eq!(plan.vertical, Vertical::Flight);
    assert!(plan.is_multi_vertical());
    assert_eq!(plan.verticals(), vec![Vertical::Flight, Vertical::Hotel]);
    let airport = plan.soft_constraint(AIRPORT_SLOT).expect("airport constraint");
    assert_eq!(airport.state, SlotState::CityOnly);
    assert_eq!(airport.value.as_deref(), Some("Tokyo"));

    // Hotel slice retrieval goes through the runner
    let catalog = Arc::new(RecordingCatalog {
        queries: Mutex::new(Vec::new()),
    });
    let registry = ActionRegistryBuilder::new(ActionsConfig::default())
        .with_catalog(catalog.clone())
        .build()
        .unwrap();
    let runner = ActionRunner::new(Arc::new(registry));
    let (sink, mut blocks) = ChannelSink::new();
    let ctx = RequestContext::new(Arc::new(sink)).with_session("session-1");

    let queries = plan.queries_for(Vertical::Hotel);
    assert_eq!(queries, vec!["hotels near Tokyo airport", "airport hotels Tokyo"]);
    let output = runner
        .invoke(
            ActionKind::CatalogSearch.as_str(),
            serde_json::json!({ "queries": queries, "catalog": "hotels" }),
            &ctx,
        )
        .await
        .unwrap();
    let output: SearchOutput = serde_json::from_value(output).unwrap();

    // Same listing from both sub-queries merges into one result
    assert_eq!(output.results.len(), 1);
    assert_eq!(catalog.queries.lock().unwrap().len(), 2);
    assert!(catalog
        .queries
        .lock()
        .unwrap()
        .iter()
        .all(|(kind, _)| *kind == CatalogKind::Hotels));

    let Ok(Block::Sources { action, items }) = blocks.try_recv() else {
        panic!("expected a sources block");
    };
    assert_eq!(action, "catalog_search");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].url.as_deref(), Some("https://hotels.test/haneda-excel"));
    assert!(blocks.try_recv().is_err());
}

#[tokio::test]
async fn test_pipeline_survives_provider_outage() {
    let provider = Arc::new(ScriptedProvider::new(vec![None, None]));

    let normalizer = QueryNormalizer::new(provider.clone(), NormalizerConfig::default());
    let repaired = normalizer.repair("wicke dfor good showtimes", "movies").await;
    assert_eq!(repaired, "wicke dfor good showtimes");

    let planner = QueryPlanner::new(provider.clone(), PlannerConfig::default());
    let plan = planner.plan(&repaired, &[], Some(PlanMode::Deep)).await;
    assert_eq!(plan.vertical, Vertical::Other);
    assert_eq!(plan.rewritten_prompt, "wicke dfor good showtimes");
    assert!(plan.candidates.is_empty());
}

#[tokio::test]
async fn test_quick_pipeline_uses_history_for_airport_city() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let planner = QueryPlanner::new(provider.clone(), PlannerConfig::default());
    let history = vec![Message::user("I'm flying to Osaka next month")];

    let plan = planner
        .plan("a hotel near the airport", &history, Some(PlanMode::Quick))
        .await;

    assert_eq!(provider.call_count(), 0);
    assert_eq!(plan.vertical, Vertical::Hotel);
    let airport = plan.soft_constraint(AIRPORT_SLOT).expect("airport constraint");
    assert_eq!(airport.state, SlotState::CityOnly);
    assert_eq!(airport.value.as_deref(), Some("Osaka"));
}
