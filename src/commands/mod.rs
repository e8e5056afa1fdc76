/*!
Command handlers for the CLI

Each subcommand exercises one stage of the pipeline:

- `repair`: Query repair through the completion provider
- `plan`: Repair, then build a retrieval plan
- `novelty`: Rank candidate follow-ups
- `shop`: Run the catalog search action
*/

use crate::config::Config;
use crate::error::Result;
use crate::providers::{create_provider, Provider};
use std::sync::Arc;

fn shared_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    Ok(Arc::from(create_provider(&config.provider)?))
}

// Query repair handler
pub mod repair {
    use super::*;
    use crate::normalizer::QueryNormalizer;

    /// Repair `query` and print the result
    ///
    /// Prints the original query when the provider is unavailable.
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be created
    pub async fn run_repair(config: Config, query: String, domain: String) -> Result<()> {
        let normalizer = QueryNormalizer::new(shared_provider(&config)?, config.normalizer.clone());
        let repaired = normalizer.repair(&query, &domain).await;
        println!("{}", repaired);
        Ok(())
    }
}

// Plan handler
pub mod plan {
    use super::*;
    use crate::normalizer::QueryNormalizer;
    use crate::planner::{PlanMode, QueryPlan, QueryPlanner};
    use crate::providers::Message;
    use colored::Colorize;

    /// Build and print a plan for `query`
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    /// * `query` - Raw query text
    /// * `mode` - "quick" or "deep"; the configured default when absent
    /// * `history` - Earlier user turns, oldest first
    /// * `no_repair` - Skip the repair step
    /// * `json` - Print JSON instead of a summary
    ///
    /// # Errors
    ///
    /// Returns error if the mode is invalid or the provider cannot be created
    pub async fn run_plan(
        config: Config,
        query: String,
        mode: Option<String>,
        history: Vec<String>,
        no_repair: bool,
        json: bool,
    ) -> Result<()> {
        let mode = match mode {
            Some(m) => m.parse::<PlanMode>()?,
            None => config.default_plan_mode(),
        };

        let provider = shared_provider(&config)?;

        // Quick plans never call the provider, so repair is skipped as well
        let query = if no_repair || mode == PlanMode::Quick {
            query
        } else {
            QueryNormalizer::new(provider.clone(), config.normalizer.clone())
                .repair(&query, "general")
                .await
        };

        let history: Vec<Message> = history.into_iter().map(Message::user).collect();
        let planner = QueryPlanner::new(provider, config.planner.clone());
        let plan = planner.plan(&query, &history, Some(mode)).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print_plan(&plan);
        }
        Ok(())
    }

    fn print_plan(plan: &QueryPlan) {
        println!("\n{}\n", "Query Plan".bold());
        println!("Vertical:       {}", plan.vertical.as_str().green());
        println!("Intent:         {}", plan.intent.as_str());
        println!("Rewritten:      {}", plan.rewritten_prompt);
        println!("Time:           {:?}", plan.time_sensitivity);

        if plan.is_multi_vertical() {
            println!("\n{}", "Decomposition".bold());
            for vertical in plan.verticals() {
                println!("  {:<8} {}", vertical.as_str(), plan.context_for(vertical));
                for query in plan.queries_for(vertical) {
                    println!("    - {}", query.dimmed());
                }
            }
        }

        if !plan.candidates.is_empty() {
            println!("\n{}", "Candidates".bold());
            for candidate in &plan.candidates {
                println!(
                    "  {:<8} {:<8} {:.2}",
                    candidate.vertical.as_str(),
                    candidate.intent.as_str(),
                    candidate.score
                );
            }
        }

        if !plan.preference_priority.is_empty() {
            println!("\nPriority:       {}", plan.preference_priority.join(" > "));
        }

        for constraint in &plan.soft_constraints {
            println!(
                "Soft:           {} {:?} {}",
                constraint.slot,
                constraint.state,
                constraint.value.as_deref().unwrap_or("")
            );
        }

        if let Some(ambiguity) = &plan.ambiguity {
            println!(
                "Ambiguous:      {:?} -> {}",
                ambiguity.interpretations,
                ambiguity
                    .resolved
                    .as_deref()
                    .unwrap_or("unresolved")
                    .yellow()
            );
        }
        println!();
    }
}

// Follow-up novelty handler
pub mod novelty {
    use super::*;
    use crate::novelty::select_followups;
    use colored::Colorize;

    /// Score candidates against recent follow-ups and print the ranking
    pub fn run_novelty(candidates: Vec<String>, recent: Vec<String>) -> Result<()> {
        let picked = select_followups(&candidates, &recent, candidates.len());
        if picked.is_empty() {
            println!("{}", "No novel follow-ups".yellow());
            return Ok(());
        }
        for followup in picked {
            println!("{:.2}  {}", followup.score, followup.text);
        }
        Ok(())
    }
}

// Catalog search handler
pub mod shop {
    use super::*;
    use crate::actions::context::{Block, ChannelSink};
    use crate::actions::serpapi::SerpApiClient;
    use crate::actions::{
        ActionKind, ActionRegistryBuilder, ActionRunner, CatalogKind, RequestContext, SearchOutput,
    };
    use crate::session::{new_session_id, Session, SessionStore, StaleSweeper, SystemClock};
    use colored::Colorize;

    /// Run `catalog_search` for `queries`
    ///
    /// Ctrl-C cancels the in-flight sub-queries.
    ///
    /// # Errors
    ///
    /// Returns error if the input is invalid or the run is cancelled
    pub async fn run_shop(config: Config, queries: Vec<String>, hotels: bool, json: bool) -> Result<()> {
        let client = SerpApiClient::new(config.actions.serpapi.clone())?;
        let registry = ActionRegistryBuilder::new(config.actions.clone())
            .with_catalog(Arc::new(client))
            .build()?;
        let runner = ActionRunner::new(Arc::new(registry));

        let sessions = SessionStore::from_config(&config.session, Arc::new(SystemClock));
        let sweeper = StaleSweeper::from_config(sessions.clone(), &config.session);
        let session_id = new_session_id();
        sessions.set(&session_id, Session::new(session_id.as_str(), chrono::Utc::now()));

        let (sink, mut blocks) = ChannelSink::new();
        let ctx = RequestContext::new(Arc::new(sink)).with_session(session_id.clone());

        let token = ctx.cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!(shop.event = "interrupted", "Cancelling catalog search");
                token.cancel();
            }
        });

        let catalog = if hotels {
            CatalogKind::Hotels
        } else {
            CatalogKind::Shopping
        };
        let input = serde_json::json!({ "queries": queries, "catalog": catalog });
        let outcome = runner
            .invoke(ActionKind::CatalogSearch.as_str(), input, &ctx)
            .await;
        interrupt.abort();

        if let Ok(value) = &outcome {
            if let Some(mut session) = sessions.get(&session_id) {
                session.payload = serde_json::json!({ "last_output": value });
                sessions.set(&session_id, session);
            }
        }
        sweeper.stop();
        sweeper.join().await;

        let output: SearchOutput = serde_json::from_value(outcome?)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if output.failed_queries > 0 {
            println!(
                "{}",
                format!("{} sub-queries failed", output.failed_queries).yellow()
            );
        }
        if output.results.is_empty() {
            println!("No results");
            return Ok(());
        }
        for (index, chunk) in output.results.iter().enumerate() {
            println!("{}. {}", index + 1, chunk.content);
            if let Some(url) = chunk.identity() {
                println!("   {}", url.dimmed());
            }
        }

        while let Ok(Block::Sources { action, items }) = blocks.try_recv() {
            tracing::debug!(shop.event = "sources", action = %action, sources = items.len(), "Sources block");
        }
        Ok(())
    }
}
