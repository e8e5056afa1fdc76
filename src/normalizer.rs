//! Pre-retrieval query repair
//!
//! [`QueryNormalizer`] asks the completion provider to fix typos and broken
//! word boundaries. Repair is fail-open: any provider failure, timeout or
//! unusable reply yields the original query.

use crate::config::NormalizerConfig;
use crate::prompts::build_repair_messages;
use crate::providers::{CompletionOptions, Provider};
use std::sync::Arc;

/// Phrases the split-merging fallback knows how to restore
///
/// Matching ignores spaces and case, so "su per man" and "Super Man" both map
/// to "superman" and "wicke dfor" maps to "wicked for".
const KNOWN_SPLITS: &[&str] = &[
    "superman",
    "spiderman",
    "batman",
    "iphone",
    "airpods",
    "playstation",
    "macbook",
    "headphones",
    "airport",
    "wicked for",
];

/// Longest token window considered by the fallback
const MAX_SPLIT_TOKENS: usize = 4;

/// Replies longer than this multiple of the input are treated as chatter
const MAX_GROWTH_FACTOR: usize = 3;

/// LLM-backed query repair
pub struct QueryNormalizer {
    provider: Arc<dyn Provider>,
    config: NormalizerConfig,
}

impl QueryNormalizer {
    /// Create a normalizer
    ///
    /// # Arguments
    ///
    /// * `provider` - Completion provider used for repair
    /// * `config` - Sampling, timeout and fallback settings
    pub fn new(provider: Arc<dyn Provider>, config: NormalizerConfig) -> Self {
        Self { provider, config }
    }

    /// Repair a raw query
    ///
    /// Blank input is returned unchanged without calling the provider.
    ///
    /// # Arguments
    ///
    /// * `raw_query` - Text as typed by the user
    /// * `domain_hint` - Domain used to infer intended terms ("movies", "hotels", ...)
    ///
    /// # Returns
    ///
    /// The corrected query, or the original when repair is not possible
    pub async fn repair(&self, raw_query: &str, domain_hint: &str) -> String {
        if raw_query.trim().is_empty() {
            return raw_query.to_string();
        }

        let messages = build_repair_messages(raw_query, domain_hint);
        let options =
            CompletionOptions::deterministic(self.config.temperature, self.config.max_tokens);

        let outcome = tokio::time::timeout(
            self.config.timeout(),
            self.provider.complete_text(&messages, &options),
        )
        .await;

        let reply = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(
                    normalizer.event = "provider_error",
                    error = %e,
                    "Query repair failed, keeping original query"
                );
                return self.fallback(raw_query);
            }
            Err(_) => {
                tracing::warn!(
                    normalizer.event = "timeout",
                    timeout_secs = self.config.timeout_seconds,
                    "Query repair timed out, keeping original query"
                );
                return self.fallback(raw_query);
            }
        };

        match clean_completion(&reply) {
            Some(corrected) if is_plausible_repair(raw_query, &corrected) => {
                if corrected != raw_query.trim() {
                    tracing::debug!(
                        normalizer.event = "repaired",
                        original = raw_query,
                        corrected = %corrected,
                        "Query repaired"
                    );
                }
                corrected
            }
            _ => {
                tracing::warn!(
                    normalizer.event = "malformed_reply",
                    reply_len = reply.len(),
                    "Unusable repair reply, keeping original query"
                );
                self.fallback(raw_query)
            }
        }
    }

    fn fallback(&self, raw_query: &str) -> String {
        if self.config.heuristic_fallback {
            merge_known_splits(raw_query)
        } else {
            raw_query.to_string()
        }
    }
}

/// Strip code fences, surrounding quotes and a leading label from a reply
///
/// Returns `None` when nothing usable remains.
///
/// # Examples
///
/// ```
/// use clonar::normalizer::clean_completion;
///
/// assert_eq!(clean_completion("```\n\"wicked for good\"\n```").as_deref(), Some("wicked for good"));
/// assert_eq!(clean_completion("``` ```"), None);
/// ```
pub fn clean_completion(reply: &str) -> Option<String> {
    let mut text = reply
        .lines()
        .map(strip_fence)
        .find(|line| !line.is_empty())?;

    for label in ["corrected query:", "corrected:", "query:"] {
        if text.len() >= label.len()
            && text.is_char_boundary(label.len())
            && text[..label.len()].eq_ignore_ascii_case(label)
        {
            text = text[label.len()..].trim();
            break;
        }
    }

    let text = text
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}'))
        .trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Remove an opening fence with optional language tag and a closing fence
fn strip_fence(line: &str) -> &str {
    let mut line = line.trim();
    if let Some(rest) = line.strip_prefix("```") {
        // A bare tag after an opening fence on its own line is not content
        line = match rest.split_once(char::is_whitespace) {
            Some((tag, body)) if is_fence_tag(tag) => body,
            None if is_fence_tag(rest) => "",
            _ => rest,
        };
    }
    if let Some(rest) = line.trim_end().strip_suffix("```") {
        line = rest;
    }
    line.trim()
}

fn is_fence_tag(word: &str) -> bool {
    matches!(word, "" | "text" | "txt" | "plaintext" | "json" | "markdown" | "md")
}

fn is_plausible_repair(original: &str, corrected: &str) -> bool {
    let limit = original.trim().len() * MAX_GROWTH_FACTOR + 20;
    corrected.len() <= limit
}

/// Merge adjacent tokens that spell a known split phrase
///
/// Windows of 2 to 4 tokens are compared to [`KNOWN_SPLITS`] ignoring case,
/// spaces and punctuation. Phrases of 7+ letters also match when exactly one
/// letter is missing.
/// Best effort only.
///
/// # Examples
///
/// ```
/// use clonar::normalizer::merge_known_splits;
///
/// assert_eq!(merge_known_splits("su per man movie"), "superman movie");
/// assert_eq!(merge_known_splits("wicke dfor good movie"), "wicked for good movie");
/// assert_eq!(merge_known_splits("red shoes"), "red shoes");
/// ```
pub fn merge_known_splits(query: &str) -> String {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    'outer: while i < tokens.len() {
        for width in (2..=MAX_SPLIT_TOKENS).rev() {
            if i + width > tokens.len() {
                continue;
            }
            let window = squash(&tokens[i..i + width].concat());
            if window.is_empty() {
                continue;
            }
            if let Some(phrase) = KNOWN_SPLITS.iter().find(|phrase| {
                let target = squash(phrase);
                window == target
                    || (target.len() >= 7
                        && window.len() + 1 == target.len()
                        && strsim::levenshtein(&window, &target) == 1)
            }) {
                out.push((*phrase).to_string());
                i += width;
                continue 'outer;
            }
        }
        out.push(tokens[i].to_string());
        i += 1;
    }

    out.join(" ")
}

fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
