//! Follow-up novelty scoring
//!
//! Scores candidate follow-up prompts so the assistant does not repeat
//! suggestions it has recently shown. Pure functions, safe to call from any
//! thread.

use serde::Serialize;

/// Score for prompts that dig into downsides or non-obvious facts
pub const CRITICAL_SCORE: f64 = 1.0;

/// Score for prompts that ask for alternatives or comparisons
pub const COMPARATIVE_SCORE: f64 = 0.5;

/// Score for any other non-repetitive prompt
pub const BASELINE_SCORE: f64 = 0.3;

/// Word stems in the critical band, matched against token prefixes
const CRITICAL_STEMS: &[&str] = &[
    "regret",
    "avoid",
    "hidden",
    "overrated",
    "underrated",
    "worst",
    "downside",
    "drawback",
    "mistake",
    "complain",
    "complaint",
    "flaw",
    "pitfall",
    "scam",
    "dealbreaker",
];

/// Multi-word phrases in the critical band
const CRITICAL_PHRASES: &[&str] = &["wish i knew", "red flag", "deal breaker", "nobody tells"];

/// Word stems in the comparative band
const COMPARATIVE_STEMS: &[&str] = &[
    "alternative",
    "instead",
    "compar",
    "versus",
    "vs",
    "cheaper",
    "similar",
    "rather",
];

/// Multi-word phrases in the comparative band
const COMPARATIVE_PHRASES: &[&str] = &["what about", "how about", "other option", "better than"];

/// A follow-up chosen by [`select_followups`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFollowup {
    /// Candidate text as supplied
    pub text: String,
    /// Novelty score in [0, 1]
    pub score: f64,
}

/// Score how novel and substantive a candidate follow-up is
///
/// Returns 0 for blank candidates and for candidates that overlap (either
/// direction, case-insensitive substring) with a recent follow-up. Otherwise
/// the highest matching vocabulary band wins.
///
/// # Examples
///
/// ```
/// use clonar::novelty::novelty_score;
///
/// assert_eq!(novelty_score::<&str>("", &[]), 0.0);
/// assert_eq!(novelty_score::<&str>("What do people regret about this hotel?", &[]), 1.0);
/// assert_eq!(novelty_score::<&str>("any alternative brands?", &[]), 0.5);
/// assert_eq!(novelty_score::<&str>("tell me more", &[]), 0.3);
/// ```
pub fn novelty_score<S: AsRef<str>>(candidate: &str, recent_followups: &[S]) -> f64 {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return 0.0;
    }

    let lowered = candidate.to_lowercase();
    let repeats = recent_followups.iter().any(|recent| {
        let recent = recent.as_ref().trim().to_lowercase();
        !recent.is_empty() && (recent.contains(&lowered) || lowered.contains(&recent))
    });
    if repeats {
        return 0.0;
    }

    let tokens = tokenize(&lowered);
    let joined = tokens.join(" ");

    if matches_band(&tokens, &joined, CRITICAL_STEMS, CRITICAL_PHRASES) {
        CRITICAL_SCORE
    } else if matches_band(&tokens, &joined, COMPARATIVE_STEMS, COMPARATIVE_PHRASES) {
        COMPARATIVE_SCORE
    } else {
        BASELINE_SCORE
    }
}

/// Pick the most novel follow-ups
///
/// Candidates are ranked by descending score, ties keep their input order.
/// Zero-scored candidates are dropped, and a candidate that overlaps one
/// already picked is skipped.
///
/// # Arguments
///
/// * `candidates` - Follow-ups proposed for this turn
/// * `recent` - Follow-ups already shown to the user
/// * `limit` - Maximum number to return
pub fn select_followups<C: AsRef<str>, R: AsRef<str>>(
    candidates: &[C],
    recent: &[R],
    limit: usize,
) -> Vec<ScoredFollowup> {
    let mut scored: Vec<ScoredFollowup> = candidates
        .iter()
        .map(|candidate| ScoredFollowup {
            text: candidate.as_ref().trim().to_string(),
            score: novelty_score(candidate.as_ref(), recent),
        })
        .filter(|scored| scored.score > 0.0)
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut picked: Vec<ScoredFollowup> = Vec::new();
    for followup in scored {
        if picked.len() >= limit {
            break;
        }
        let picked_texts: Vec<&str> = picked.iter().map(|p| p.text.as_str()).collect();
        if novelty_score(&followup.text, picked_texts.as_slice()) > 0.0 {
            picked.push(followup);
        }
    }
    picked
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|token| token.trim_matches('\''))
        .filter(|token| !token.is_empty())
        .collect()
}

fn matches_band(tokens: &[&str], joined: &str, stems: &[&str], phrases: &[&str]) -> bool {
    let stem_hit = tokens.iter().any(|token| {
        stems.iter().any(|stem| {
            // Short stems must match whole tokens ("vs" but not "vsync").
            if stem.len() <= 3 {
                token == stem
            } else {
                token.starts_with(stem)
            }
        })
    });
    stem_hit || phrases.iter().any(|phrase| contains_phrase(joined, phrase))
}

fn contains_phrase(joined: &str, phrase: &str) -> bool {
    joined == phrase
        || joined.starts_with(&format!("{} ", phrase))
        || joined.ends_with(&format!(" {}", phrase))
        || joined.contains(&format!(" {} ", phrase))
}
