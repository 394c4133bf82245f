//! Display-name generation for completed queries.
//!
//! Asks the router's label path for a short human label; any failure falls
//! back deterministically to a truncation of the query text, so labeling
//! never fails the overall request.

use crate::prompt;
use crate::provider::{ProviderId, ProviderRouter};

/// Maximum label length, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;

/// Generate a display name for a completed query.
pub async fn generate(
    router: &ProviderRouter,
    query_text: &str,
    sql: &str,
    requested: Option<ProviderId>,
) -> String {
    let label_prompt = prompt::label_prompt(query_text, sql);

    match router.label(&label_prompt, requested).await {
        Ok(routed) => {
            let cleaned = clean(&routed.text);
            if cleaned.is_empty() {
                fallback(query_text)
            } else {
                cleaned
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Display name generation failed, using fallback");
            fallback(query_text)
        }
    }
}

/// Deterministic fallback: the first 50 characters of the query text.
#[must_use]
pub fn fallback(query_text: &str) -> String {
    truncate(query_text.trim())
}

/// Strip surrounding quotes and truncate to the display limit.
fn clean(raw: &str) -> String {
    let mut label = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = label
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            label = inner.trim();
        }
    }
    truncate(label)
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_DISPLAY_NAME_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(fallback("show me all users"), "show me all users");
    }

    #[test]
    fn long_text_truncates_to_fifty_chars() {
        let long = "x".repeat(80);
        let name = fallback(&long);
        assert_eq!(name.chars().count(), MAX_DISPLAY_NAME_CHARS);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(60);
        let name = fallback(&long);
        assert_eq!(name.chars().count(), MAX_DISPLAY_NAME_CHARS);
    }

    #[test]
    fn quotes_are_stripped_from_labels() {
        assert_eq!(clean("\"All users\""), "All users");
        assert_eq!(clean("'All users'"), "All users");
        assert_eq!(clean("All users"), "All users");
    }

    #[test]
    fn labels_are_truncated() {
        let long = "a".repeat(80);
        assert_eq!(clean(&long).chars().count(), MAX_DISPLAY_NAME_CHARS);
    }
}
