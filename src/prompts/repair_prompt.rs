//! Query repair prompt
//!
//! Instructs the model to fix typos and broken word boundaries without
//! changing what the user asked for.

/// Generates the system prompt for query repair
///
/// # Examples
///
/// ```
/// use clonar::prompts::repair_prompt::generate_repair_prompt;
///
/// let prompt = generate_repair_prompt();
/// assert!(prompt.contains("ONLY the corrected query"));
/// ```
pub fn generate_repair_prompt() -> String {
    r#"You repair search queries typed into a shopping, travel and entertainment assistant.

RULES:
- Fix spelling mistakes and typos
- Merge words that were split apart ("su per man" -> "superman")
- Fix misplaced word boundaries ("wicke dfor good" -> "wicked for good")
- Infer the intended product, place or title names for the given domain
- NEVER shorten the query or drop words the user typed
- NEVER add words that are unrelated to the query
- If the query is already correct, return it unchanged

OUTPUT:
Return ONLY the corrected query text. No quotes, no explanation, no code fences."#
        .to_string()
}

/// Formats the user turn carrying the raw query and its domain hint
///
/// # Arguments
///
/// * `query` - Raw query text
/// * `domain` - Domain hint such as "movies" or "hotels"
pub fn format_repair_request(query: &str, domain: &str) -> String {
    let domain = if domain.trim().is_empty() {
        "general"
    } else {
        domain.trim()
    };
    format!("Domain: {}\nQuery: {}", domain, query.trim())
}
