//! Concurrent sub-query execution and result merging
//!
//! Up to [`MAX_SUB_QUERIES`] sub-queries run concurrently under the turn's
//! cancellation token. Results are merged in sub-query index order, not
//! completion order, so the output is deterministic.

use super::context::{Block, Chunk, RequestContext};
use super::metrics::ActionMetrics;
use crate::config::MAX_SUB_QUERIES;
use crate::error::{ClonarError, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

/// Merged output of a fan-out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutResult {
    /// Merged chunks, first-occurrence order
    pub chunks: Vec<Chunk>,
    /// Sub-queries issued
    pub issued: usize,
    /// Sub-queries that failed and contributed nothing
    pub failed: usize,
}

/// Run sub-queries concurrently, merge by source and emit one sources block
///
/// Cancellation is checked before anything starts, before each sub-query
/// call and before the block is emitted. Once raised, no further
/// sub-queries start and the call returns `ClonarError::Cancelled`
/// promptly. A failing sub-query is logged and contributes zero results.
///
/// # Arguments
///
/// * `action` - Action name, for logs, metrics and the sources block
/// * `queries` - Sub-queries; only the first [`MAX_SUB_QUERIES`] are issued
/// * `ctx` - Request context carrying the token and sink
/// * `search` - Runs one sub-query
///
/// # Errors
///
/// Returns `ClonarError::Cancelled` when the turn is cancelled. Sub-query
/// failures are never returned.
pub async fn fan_out<F, Fut>(
    action: &str,
    queries: &[String],
    ctx: &RequestContext,
    search: F,
) -> Result<FanOutResult>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<Chunk>>>,
{
    ctx.check_cancelled()?;

    let issued = queries.len().min(MAX_SUB_QUERIES);
    if queries.len() > issued {
        debug!(
            fanout.event = "truncated",
            action,
            requested = queries.len(),
            issued,
            "Dropping sub-queries over the limit"
        );
    }

    let search = &search;
    let calls = queries.iter().take(issued).map(|query| {
        let token = ctx.cancel.clone();
        let query = query.clone();
        async move {
            if token.is_cancelled() {
                return Err(ClonarError::Cancelled.into());
            }
            search(query).await
        }
    });

    let outcomes = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            warn!(fanout.event = "cancelled", action, "Sub-queries cancelled");
            return Err(ClonarError::Cancelled.into());
        }
        outcomes = join_all(calls) => outcomes,
    };

    let mut batches = Vec::with_capacity(issued);
    let mut failed = 0;
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(chunks) => {
                debug!(
                    fanout.event = "sub_query_done",
                    action,
                    index,
                    results = chunks.len(),
                    "Sub-query finished"
                );
                batches.push(chunks);
            }
            Err(e) if ClonarError::is_cancellation(&e) => {
                return Err(ClonarError::Cancelled.into());
            }
            Err(e) => {
                warn!(
                    fanout.event = "sub_query_failed",
                    action,
                    index,
                    error = %e,
                    "Sub-query failed, continuing without its results"
                );
                ActionMetrics::record_subquery_failure(action);
                failed += 1;
            }
        }
    }

    let chunks = merge_by_source(batches);

    ctx.check_cancelled()?;
    if !chunks.is_empty() {
        ctx.sink.emit_block(Block::Sources {
            action: action.to_string(),
            items: chunks.iter().map(Chunk::to_source_item).collect(),
        });
    }

    Ok(FanOutResult {
        chunks,
        issued,
        failed,
    })
}

/// Merge result batches by source identity
///
/// The first chunk with a given URL is kept in place; later chunks with the
/// same URL append their content to it, including repeated text. Blank
/// content adds nothing. Chunks without a URL are always kept.
///
/// # Examples
///
/// ```
/// use clonar::actions::context::Chunk;
/// use clonar::actions::fanout::merge_by_source;
///
/// let merged = merge_by_source(vec![
///     vec![Chunk::new("a").with_url("https://x.test/1")],
///     vec![Chunk::new("b").with_url("https://x.test/1"), Chunk::new("c")],
/// ]);
/// assert_eq!(merged.len(), 2);
/// assert_eq!(merged[0].content, "a\n\nb");
/// ```
pub fn merge_by_source(batches: Vec<Vec<Chunk>>) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for chunk in batches.into_iter().flatten() {
        let Some(identity) = chunk.identity().map(str::to_string) else {
            merged.push(chunk);
            continue;
        };

        match positions.get(&identity) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                if !chunk.content.trim().is_empty() {
                    if !existing.content.is_empty() {
                        existing.content.push_str("\n\n");
                    }
                    existing.content.push_str(&chunk.content);
                }
            }
            None => {
                positions.insert(identity, merged.len());
                merged.push(chunk);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::context::{ChannelSink, NullSink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn queries(items: &[&str]) -> Vec<String> {
        items.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn test_merge_concatenates_same_url() {
        let merged = merge_by_source(vec![
            vec![Chunk::new("first").with_url("https://a.test")],
            vec![
                Chunk::new("second").with_url("https://a.test"),
                Chunk::new("orphan"),
            ],
            vec![Chunk::new("orphan"), Chunk::new("other").with_url("https://b.test")],
        ]);

        assert_eq!(merged.len(), 4);
        assert_eq!(merged[0].content, "first\n\nsecond");
        assert_eq!(merged[1].content, "orphan");
        assert_eq!(merged[2].content, "orphan");
        assert_eq!(merged[3].identity(), Some("https://b.test"));
    }

    #[test]
    fn test_merge_appends_repeated_content() {
        let merged = merge_by_source(vec![
            vec![Chunk::new("same text").with_url("https://a.test")],
            vec![Chunk::new("same text").with_url("https://a.test")],
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content, "same text\n\nsame text");
    }

    #[test]
    fn test_merge_ignores_blank_duplicate() {
        let merged = merge_by_source(vec![
            vec![Chunk::new("body").with_url("https://a.test")],
            vec![Chunk::new("  ").with_url("https://a.test")],
        ]);
        assert_eq!(merged[0].content, "body");
    }

    #[tokio::test]
    async fn test_failed_sub_query_is_isolated() {
        let (sink, mut rx) = ChannelSink::new();
        let ctx = RequestContext::new(Arc::new(sink));

        let result = fan_out("catalog_search", &queries(&["ok", "boom", "ok2"]), &ctx, |q| async move {
            if q == "boom" {
                Err(anyhow::Error::from(ClonarError::Search(
                    "backend down".to_string(),
                )))
            } else {
                Ok(vec![Chunk::new(q.clone()).with_url(format!("https://x.test/{}", q))])
            }
        })
        .await
        .unwrap();

        assert_eq!(result.issued, 3);
        assert_eq!(result.failed, 1);
        assert_eq!(result.chunks.len(), 2);
        assert!(matches!(rx.try_recv(), Ok(Block::Sources { items, .. }) if items.len() == 2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_uses_index_order_not_completion_order() {
        let ctx = RequestContext::new(Arc::new(NullSink));
        let result = fan_out("catalog_search", &queries(&["slow", "fast"]), &ctx, |q| async move {
            let delay = if q == "slow" { 50 } else { 1 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![Chunk::new(q).with_url("https://same.test")])
        })
        .await
        .unwrap();

        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].content, "slow\n\nfast");
    }

    #[tokio::test]
    async fn test_pre_cancelled_issues_no_calls() {
        let (sink, mut rx) = ChannelSink::new();
        let ctx = RequestContext::new(Arc::new(sink));
        ctx.cancel.cancel();
        let calls = AtomicUsize::new(0);

        let err = fan_out("catalog_search", &queries(&["a", "b"]), &ctx, |_q| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(vec![Chunk::new("x")]) }
        })
        .await
        .unwrap_err();

        assert!(ClonarError::is_cancellation(&err));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_flight_returns_promptly() {
        let (sink, mut rx) = ChannelSink::new();
        let ctx = RequestContext::new(Arc::new(sink));
        let token = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = fan_out("uploads_search", &queries(&["a"]), &ctx, |_q| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![Chunk::new("late")])
        })
        .await
        .unwrap_err();

        assert!(ClonarError::is_cancellation(&err));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_at_most_three_sub_queries() {
        let ctx = RequestContext::new(Arc::new(NullSink));
        let calls = AtomicUsize::new(0);
        let result = fan_out("catalog_search", &queries(&["a", "b", "c", "d", "e"]), &ctx, |_q| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Vec::new()) }
        })
        .await
        .unwrap();
        assert_eq!(result.issued, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_results_emit_nothing() {
        let (sink, mut rx) = ChannelSink::new();
        let ctx = RequestContext::new(Arc::new(sink));
        let result = fan_out("catalog_search", &queries(&["a"]), &ctx, |_q| async { Ok(Vec::new()) })
            .await
            .unwrap();
        assert!(result.chunks.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
