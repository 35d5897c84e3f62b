//! Shared helpers: filesystem-safe slugification and timestamp formatting.

use chrono::{DateTime, Utc};

/// Convert arbitrary text into a lowercase, hyphenated, filesystem/URL-safe
/// slug.
///
/// Grounded exactly on `original_source/src/storage/user_storage.py`'s
/// `slugify`: lowercase, collapse whitespace/underscore runs to a single
/// hyphen, drop everything else non-alphanumeric, collapse repeated
/// hyphens, trim leading/trailing hyphens, and cap the result at 50 chars.
/// `fallback` is returned verbatim when the input slugifies to nothing.
pub fn slugify(text: &str, fallback: &str) -> String {
    let lower = text.to_lowercase();

    let mut collapsed_ws = String::with_capacity(lower.len());
    let mut last_was_sep = false;
    for ch in lower.chars() {
        if ch.is_whitespace() || ch == '_' {
            if !last_was_sep {
                collapsed_ws.push('-');
            }
            last_was_sep = true;
        } else {
            collapsed_ws.push(ch);
            last_was_sep = false;
        }
    }

    let alnum_and_hyphen: String = collapsed_ws
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    let mut collapsed_hyphens = String::with_capacity(alnum_and_hyphen.len());
    let mut last_was_hyphen = false;
    for ch in alnum_and_hyphen.chars() {
        if ch == '-' {
            if !last_was_hyphen {
                collapsed_hyphens.push('-');
            }
            last_was_hyphen = true;
        } else {
            collapsed_hyphens.push(ch);
            last_was_hyphen = false;
        }
    }

    let trimmed = collapsed_hyphens.trim_matches('-');
    let truncated: String = trimmed.chars().take(50).collect();

    if truncated.is_empty() {
        fallback.to_string()
    } else {
        truncated
    }
}

/// RFC 3339 timestamp for the current instant, used for every
/// `created_at`/`updated_at`/`captured_at` field in the on-disk layout.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn timestamp_from_secs(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("My Video Title", "doc"), "my-video-title");
    }

    #[test]
    fn collapses_whitespace_and_underscore_runs() {
        assert_eq!(slugify("a   b___c", "doc"), "a-b-c");
    }

    #[test]
    fn strips_non_alphanumeric() {
        assert_eq!(slugify("Hello, World! (v2)", "doc"), "hello-world-v2");
    }

    #[test]
    fn trims_and_caps_length() {
        let long = "a".repeat(100);
        assert_eq!(slugify(&long, "doc").len(), 50);
    }

    #[test]
    fn falls_back_on_empty_result() {
        assert_eq!(slugify("!!!", "manual"), "manual");
        assert_eq!(slugify("", "manual"), "manual");
    }
}
