//! Per-request context, output blocks and retrieved chunks
//!
//! The caller builds a [`RequestContext`] for each turn and hands it to the
//! action runner. Actions read its flags, watch its cancellation token and
//! write at most one sources block to its sink.

use crate::error::{ClonarError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One citation shown alongside an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Backend-specific fields (price, rating, address, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Structured output pushed to the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Sources backing the current answer
    Sources {
        /// Action that produced the sources
        action: String,
        items: Vec<SourceItem>,
    },
}

/// One-way, non-blocking output channel bound to a session
pub trait BlockSink: Send + Sync {
    /// Push a block to the session
    ///
    /// Must not block; delivery failures are the sink's concern.
    fn emit_block(&self, block: Block);
}

/// Sink backed by an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Block>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Block>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl BlockSink for ChannelSink {
    fn emit_block(&self, block: Block) {
        if self.tx.send(block).is_err() {
            tracing::debug!(sink.event = "closed", "Session sink closed, dropping block");
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl BlockSink for NullSink {
    fn emit_block(&self, _block: Block) {}
}

/// Everything an action may know about the current turn
///
/// Built by the caller; actions never construct one.
#[derive(Clone)]
pub struct RequestContext {
    /// Session the turn belongs to
    pub session_id: Option<String>,
    /// The turn searches the user's own content rather than public catalogs
    pub personal_search: bool,
    /// Files attached to this turn
    pub file_ids: Vec<String>,
    /// Raised when the turn is abandoned
    pub cancel: CancellationToken,
    /// Session-bound output
    pub sink: Arc<dyn BlockSink>,
}

impl RequestContext {
    /// Create a context with no files, no flags and a fresh cancellation token
    pub fn new(sink: Arc<dyn BlockSink>) -> Self {
        Self {
            session_id: None,
            personal_search: false,
            file_ids: Vec::new(),
            cancel: CancellationToken::new(),
            sink,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_personal_search(mut self, personal_search: bool) -> Self {
        self.personal_search = personal_search;
        self
    }

    pub fn with_file_ids(mut self, file_ids: Vec<String>) -> Self {
        self.file_ids = file_ids;
        self
    }

    /// Share a turn-level cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// True once the turn has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail with [`ClonarError::Cancelled`] if the turn has been cancelled
    ///
    /// # Errors
    ///
    /// Returns `ClonarError::Cancelled` when the token is raised
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ClonarError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("session_id", &self.session_id)
            .field("personal_search", &self.personal_search)
            .field("file_ids", &self.file_ids)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Metadata attached to a retrieved chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Source URL; the chunk's identity when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// One retrieved result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: ChunkMetadata::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.metadata.url = Some(url.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.extra.insert(key.into(), value);
        self
    }

    /// Dedup identity: the non-blank source URL
    pub fn identity(&self) -> Option<&str> {
        self.metadata
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Citation for this chunk
    ///
    /// Falls back to the URL, then to "Untitled", when there is no title.
    pub fn to_source_item(&self) -> SourceItem {
        let title = self
            .metadata
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.identity().map(str::to_string))
            .unwrap_or_else(|| "Untitled".to_string());
        SourceItem {
            title,
            url: self.identity().map(str::to_string),
            metadata: self.metadata.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_cancelled() {
        let ctx = RequestContext::new(Arc::new(NullSink));
        assert!(ctx.check_cancelled().is_ok());
        ctx.cancel.cancel();
        let err = ctx.check_cancelled().unwrap_err();
        assert!(ClonarError::is_cancellation(&err));
    }

    #[test]
    fn test_shared_token_cascades() {
        let token = CancellationToken::new();
        let a = RequestContext::new(Arc::new(NullSink)).with_cancellation(token.child_token());
        let b = RequestContext::new(Arc::new(NullSink)).with_cancellation(token.child_token());
        token.cancel();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit_block(Block::Sources {
            action: "catalog_search".to_string(),
            items: vec![],
        });
        assert!(matches!(rx.recv().await, Some(Block::Sources { .. })));
    }

    #[test]
    fn test_channel_sink_closed_receiver_is_silent() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit_block(Block::Sources {
            action: "uploads_search".to_string(),
            items: vec![],
        });
    }

    #[test]
    fn test_chunk_identity_ignores_blank_url() {
        assert_eq!(Chunk::new("a").with_url("  ").identity(), None);
        assert_eq!(
            Chunk::new("a").with_url("https://x.test/a").identity(),
            Some("https://x.test/a")
        );
    }

    #[test]
    fn test_source_item_title_fallback() {
        let item = Chunk::new("body").with_url("https://x.test/a").to_source_item();
        assert_eq!(item.title, "https://x.test/a");
        assert_eq!(Chunk::new("body").to_source_item().title, "Untitled");
    }

    #[test]
    fn test_sources_block_serializes_tagged() {
        let block = Block::Sources {
            action: "catalog_search".to_string(),
            items: vec![Chunk::new("x").with_title("Shoe").to_source_item()],
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "sources");
        assert_eq!(json["items"][0]["title"], "Shoe");
    }
}
