//! Preference relaxation
//!
//! When retrieval returns too few results, constraints are dropped one at a
//! time from the end of `preference_priority`, always the lowest-priority one
//! still in effect.

use crate::error::Result;
use std::future::Future;

/// Result of a relaxation run
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxationOutcome<T> {
    /// Constraints in effect for the final search
    pub constraints: Vec<String>,
    /// Results of the final search
    pub results: Vec<T>,
    /// Constraints removed, in the order they were dropped
    pub dropped: Vec<String>,
}

/// Constraint sets tried by relaxation, in order
///
/// The full list first, then each prefix down to the empty list.
///
/// # Examples
///
/// ```
/// use clonar::planner::relax::relaxation_steps;
///
/// let steps = relaxation_steps(&["dates:today".to_string(), "budget:low".to_string()]);
/// assert_eq!(steps.len(), 3);
/// assert_eq!(steps[1], vec!["dates:today".to_string()]);
/// assert!(steps[2].is_empty());
/// ```
pub fn relaxation_steps(priority: &[String]) -> Vec<Vec<String>> {
    (0..=priority.len())
        .rev()
        .map(|len| priority[..len].to_vec())
        .collect()
}

/// Search with progressively fewer constraints until enough results appear
///
/// # Arguments
///
/// * `priority` - Constraints, most important first
/// * `min_results` - Stop once a search returns at least this many results
/// * `search` - Runs one search with the given constraint set
///
/// # Returns
///
/// The final constraint set, its results and the dropped constraints. When
/// every constraint has been dropped the last (unconstrained) results are
/// returned even if still short.
///
/// # Errors
///
/// Propagates the first search error
pub async fn relax_preferences<T, F, Fut>(
    priority: &[String],
    min_results: usize,
    mut search: F,
) -> Result<RelaxationOutcome<T>>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut constraints = priority.to_vec();
    let mut dropped = Vec::new();

    loop {
        let results = search(constraints.clone()).await?;
        if results.len() >= min_results || constraints.is_empty() {
            tracing::debug!(
                relax.event = "done",
                remaining = constraints.len(),
                dropped = dropped.len(),
                results = results.len(),
                "Preference relaxation finished"
            );
            return Ok(RelaxationOutcome {
                constraints,
                results,
                dropped,
            });
        }

        if let Some(lowest) = constraints.pop() {
            tracing::debug!(relax.event = "drop", constraint = %lowest, "Relaxing constraint");
            dropped.push(lowest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn priority() -> Vec<String> {
        vec![
            "destination:Lisbon".to_string(),
            "dates:next weekend".to_string(),
            "budget:under $100".to_string(),
            "amenities:pool".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_drops_lowest_priority_first() {
        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        // Only enough results once both budget and pool are gone.
        let outcome = relax_preferences(&priority(), 3, move |constraints: Vec<String>| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(constraints.clone());
                let count = if constraints.len() <= 2 { 5 } else { 1 };
                Ok::<_, anyhow::Error>((0..count).collect::<Vec<u32>>())
            }
        })
        .await
        .unwrap();

        assert_eq!(
            outcome.constraints,
            vec!["destination:Lisbon", "dates:next weekend"]
        );
        assert_eq!(outcome.dropped, vec!["amenities:pool", "budget:under $100"]);
        assert_eq!(outcome.results.len(), 5);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_stops_immediately_when_enough() {
        let outcome = relax_preferences(&priority(), 1, |_c: Vec<String>| async {
            Ok::<_, anyhow::Error>(vec!["hit"])
        })
        .await
        .unwrap();
        assert_eq!(outcome.constraints.len(), 4);
        assert!(outcome.dropped.is_empty());
    }

    #[tokio::test]
    async fn test_exhausts_list() {
        let outcome = relax_preferences(&priority(), 10, |_c: Vec<String>| async {
            Ok::<_, anyhow::Error>(Vec::<u8>::new())
        })
        .await
        .unwrap();
        assert!(outcome.constraints.is_empty());
        assert_eq!(outcome.dropped.len(), 4);
        assert_eq!(outcome.dropped[0], "amenities:pool");
        assert_eq!(outcome.dropped[3], "destination:Lisbon");
    }

    #[tokio::test]
    async fn test_search_error_propagates() {
        let result = relax_preferences(&priority(), 1, |_c: Vec<String>| async {
            Err::<Vec<u8>, _>(anyhow::anyhow!("backend down"))
        })
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_relaxation_steps_empty() {
        assert_eq!(relaxation_steps(&[]), vec![Vec::<String>::new()]);
    }
}
