//! System prompts for the LLM-backed pipeline stages
//!
//! This module provides the fixed prompts used by query repair and by
//! deep-mode query planning.

pub mod classify_prompt;
pub mod repair_prompt;

use crate::providers::Message;

/// Builds the message list for a repair call
///
/// # Arguments
///
/// * `query` - Raw query text
/// * `domain` - Domain hint
///
/// # Returns
///
/// A system message with the repair rules followed by the user turn
pub fn build_repair_messages(query: &str, domain: &str) -> Vec<Message> {
    vec![
        Message::system(repair_prompt::generate_repair_prompt()),
        Message::user(repair_prompt::format_repair_request(query, domain)),
    ]
}

/// Builds the message list for a classification call
///
/// Only the trailing `history_window` history messages are included.
///
/// # Examples
///
/// ```
/// use clonar::prompts::build_classify_messages;
/// use clonar::providers::Message;
///
/// let history = vec![Message::user("I'm going to Japan"), Message::assistant("Nice!")];
/// let messages = build_classify_messages("flights to Tokyo", &history, 1);
/// assert_eq!(messages.len(), 3);
/// assert_eq!(messages[1].content, "Nice!");
/// ```
pub fn build_classify_messages(
    query: &str,
    history: &[Message],
    history_window: usize,
) -> Vec<Message> {
    let skip = history.len().saturating_sub(history_window);
    let mut messages = Vec::with_capacity(history.len() - skip + 2);
    messages.push(Message::system(classify_prompt::generate_classify_prompt()));
    messages.extend(
        history
            .iter()
            .skip(skip)
            .filter(|m| m.role != "system")
            .cloned(),
    );
    messages.push(Message::user(query.trim()));
    messages
}
