//! Cross-provider identity matching strategies.
//!
//! Fuzzy name reconciliation is inherently heuristic, so the strategy sits
//! behind a trait: the default matcher normalizes names, and a stricter
//! matcher that only accepts explicit cross-provider ids can replace it
//! where providers supply stable ids.

use crate::report::RawCrewRecord;

/// Maps a raw record to a stable, provider-agnostic identity key.
pub trait IdentityMatcher: Send + Sync {
    /// Returns the identity key for a record, or `None` when the record
    /// cannot be normalized (the reconciler drops such records with a log,
    /// never an error).
    fn identity_key(&self, record: &RawCrewRecord) -> Option<String>;
}

/// Normalizes a human name into a matching key: lowercase, punctuation
/// stripped, whitespace collapsed. "J. Doe" and "J Doe" both become
/// "j doe".
pub fn normalize_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Default matcher: explicit cross-provider id when present, normalized
/// name otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedNameMatcher;

impl IdentityMatcher for NormalizedNameMatcher {
    fn identity_key(&self, record: &RawCrewRecord) -> Option<String> {
        if let Some(id) = record.external_id.as_deref() {
            let id = id.trim();
            if !id.is_empty() {
                return Some(format!("id:{}", id.to_ascii_lowercase()));
            }
        }
        normalize_name(&record.name)
    }
}

/// Strict matcher: only explicit cross-provider ids are accepted. Records
/// without one are treated as unmatchable and dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalIdMatcher;

impl IdentityMatcher for ExternalIdMatcher {
    fn identity_key(&self, record: &RawCrewRecord) -> Option<String> {
        let id = record.external_id.as_deref()?.trim();
        if id.is_empty() {
            None
        } else {
            Some(format!("id:{}", id.to_ascii_lowercase()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("J. Doe"), Some("j doe".to_string()));
        assert_eq!(normalize_name("J Doe"), Some("j doe".to_string()));
        assert_eq!(normalize_name("  JANE   DOE "), Some("jane doe".to_string()));
        assert_eq!(normalize_name("O'Neill, Jack"), Some("o neill jack".to_string()));
        assert_eq!(normalize_name("..."), None);
        assert_eq!(normalize_name(""), None);
    }

    #[test]
    fn test_name_matcher_prefers_external_id() {
        let matcher = NormalizedNameMatcher;

        let by_name = RawCrewRecord::named("J. Doe");
        assert_eq!(matcher.identity_key(&by_name), Some("j doe".to_string()));

        let by_id = RawCrewRecord::named("J. Doe").with_external_id("NASA-42");
        assert_eq!(matcher.identity_key(&by_id), Some("id:nasa-42".to_string()));
    }

    #[test]
    fn test_external_id_matcher_rejects_nameless_ids() {
        let matcher = ExternalIdMatcher;

        let no_id = RawCrewRecord::named("J. Doe");
        assert_eq!(matcher.identity_key(&no_id), None);

        let blank_id = RawCrewRecord::named("J. Doe").with_external_id("  ");
        assert_eq!(matcher.identity_key(&blank_id), None);

        let with_id = RawCrewRecord::named("J. Doe").with_external_id("esa-7");
        assert_eq!(matcher.identity_key(&with_id), Some("id:esa-7".to_string()));
    }

    #[test]
    fn test_same_person_different_spellings_collide() {
        let matcher = NormalizedNameMatcher;
        let a = matcher.identity_key(&RawCrewRecord::named("J. Doe")).unwrap();
        let b = matcher.identity_key(&RawCrewRecord::named("J Doe")).unwrap();
        assert_eq!(a, b);
    }
}
