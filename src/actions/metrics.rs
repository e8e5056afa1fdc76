//! Metrics for action executions
//!
//! # Metrics
//!
//! - `action_executions_total`: Counter of action runs by action
//! - `action_duration_seconds`: Histogram of run duration by action and status
//! - `action_results`: Histogram of merged result counts
//! - `action_errors_total`: Counter of failed runs by error type
//! - `action_subquery_failures_total`: Counter of isolated sub-query failures
//! - `action_active_count`: Gauge of runs in flight
//!
//! # Examples
//!
//! ```
//! use clonar::actions::metrics::ActionMetrics;
//!
//! let metrics = ActionMetrics::new("catalog_search");
//! metrics.record_completion(4, "success");
//! ```

use metrics::{decrement_gauge, histogram, increment_counter, increment_gauge};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Metrics for a single action run
///
/// Records exactly once: the first `record_completion` or `record_error`
/// wins, and dropping an unrecorded tracker still releases the active gauge.
#[derive(Debug)]
pub struct ActionMetrics {
    action: String,
    start: Instant,
    recorded: AtomicBool,
}

impl ActionMetrics {
    /// Start tracking a run of `action`
    pub fn new(action: impl Into<String>) -> Self {
        let action = action.into();
        increment_counter!("action_executions_total", "action" => action.clone());
        increment_gauge!("action_active_count", 1.0, "action" => action.clone());

        Self {
            action,
            start: Instant::now(),
            recorded: AtomicBool::new(false),
        }
    }

    /// Record a finished run
    ///
    /// # Arguments
    ///
    /// * `results` - Number of merged results returned
    /// * `status` - "success", "empty", "partial", ...
    pub fn record_completion(&self, results: usize, status: &str) {
        if self.recorded.swap(true, Ordering::SeqCst) {
            return;
        }

        histogram!(
            "action_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "action" => self.action.clone(),
            "status" => status.to_string()
        );
        histogram!(
            "action_results",
            results as f64,
            "action" => self.action.clone()
        );
        decrement_gauge!("action_active_count", 1.0, "action" => self.action.clone());
    }

    /// Record a failed run ("invalid_input", "cancelled", "disabled", ...)
    pub fn record_error(&self, error_type: &str) {
        if self.recorded.swap(true, Ordering::SeqCst) {
            return;
        }

        increment_counter!(
            "action_errors_total",
            "action" => self.action.clone(),
            "error_type" => error_type.to_string()
        );
        decrement_gauge!("action_active_count", 1.0, "action" => self.action.clone());
    }

    /// Count one sub-query that failed and was isolated
    pub fn record_subquery_failure(action: &str) {
        increment_counter!("action_subquery_failures_total", "action" => action.to_string());
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    /// True once a completion or error was recorded
    pub fn is_recorded(&self) -> bool {
        self.recorded.load(Ordering::SeqCst)
    }
}

impl Drop for ActionMetrics {
    fn drop(&mut self) {
        if !self.recorded.load(Ordering::SeqCst) {
            decrement_gauge!("action_active_count", 1.0, "action" => self.action.clone());
        }
    }
}
