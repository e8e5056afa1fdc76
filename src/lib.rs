//! Clonar - query understanding and retrieval orchestration library
//!
//! This library sits between a chat front end and its retrieval backends:
//! it repairs the raw query, plans retrieval across verticals, runs typed
//! search actions and ranks follow-up suggestions.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: Bounded LRU session cache with idle expiry and a sweeper
//! - `normalizer`: Fail-open query repair through the completion provider
//! - `planner`: Query planning (quick keyword rules or deep LLM classification)
//! - `actions`: Typed retrieval actions, registry, runner and fan-out
//! - `novelty`: Follow-up novelty scoring
//! - `providers`: Completion provider abstraction and the Ollama implementation
//! - `prompts`: Prompt templates for repair and classification
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use clonar::planner::{quick_plan, Vertical};
//!
//! let plan = quick_plan("cheap flights to Tokyo and a hotel near Shinjuku", &[]);
//! assert_eq!(plan.vertical, Vertical::Flight);
//! ```

pub mod actions;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalizer;
pub mod novelty;
pub mod planner;
pub mod prompts;
pub mod providers;
pub mod session;

// Re-export commonly used types
pub use actions::{ActionRegistry, ActionRunner, RequestContext};
pub use config::Config;
pub use error::{ClonarError, Result};
pub use normalizer::QueryNormalizer;
pub use planner::{QueryPlan, QueryPlanner};
pub use session::{SessionCache, SessionStore};
