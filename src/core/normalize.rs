//! Tag normalization and filtering.
//!
//! Tag keys arrive in whatever shape the upstream providers emit
//! (`CostCenter`, `cost_center`, `cost center`). Keys are folded to
//! lower-kebab-case, known high-cardinality identifier patterns are
//! dropped, and an optional allow-list of prefixes narrows what survives.
//! Values pass through unchanged.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// Deny patterns for high-cardinality identifier keys.
fn deny_patterns() -> &'static [Regex] {
    static DENY: OnceLock<Vec<Regex>> = OnceLock::new();
    DENY.get_or_init(|| {
        [
            r".*pod.*uid.*",      // pod UIDs
            r".*container.*id.*", // container IDs
            r".*node.*name.*",    // node names
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid deny pattern"))
        .collect()
    })
}

/// Normalize and filter a raw tag mapping.
///
/// Returns `None` for an empty input so records without tags carry no
/// labels object at all.
#[must_use]
pub fn normalize_tags(
    tags: &BTreeMap<String, String>,
    prefix_filters: &[String],
) -> Option<BTreeMap<String, String>> {
    if tags.is_empty() {
        return None;
    }

    let mut normalized = BTreeMap::new();
    for (key, value) in tags {
        let key = normalize_tag_key(key);
        if should_include_tag(&key, prefix_filters) {
            normalized.insert(key, value.clone());
        }
    }

    Some(normalized)
}

/// Fold a tag key to lower-kebab-case: lowercase, `_` and spaces become
/// `-`, runs of `-` collapse, leading/trailing `-` are trimmed.
#[must_use]
pub fn normalize_tag_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut last_was_hyphen = false;

    for c in key.chars() {
        let c = match c {
            '_' | ' ' => '-',
            other => other.to_ascii_lowercase(),
        };
        if c == '-' {
            if !last_was_hyphen {
                out.push('-');
            }
            last_was_hyphen = true;
        } else {
            out.push(c);
            last_was_hyphen = false;
        }
    }

    out.trim_matches('-').to_string()
}

/// Filter decision for a normalized key: deny high-cardinality patterns,
/// then apply the configured prefix allow-list (empty list keeps all).
fn should_include_tag(key: &str, prefix_filters: &[String]) -> bool {
    if deny_patterns().iter().any(|p| p.is_match(key)) {
        return false;
    }

    if prefix_filters.is_empty() {
        return true;
    }
    prefix_filters.iter().any(|prefix| key.starts_with(prefix.as_str()))
}
