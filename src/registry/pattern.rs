//! Target whitelist patterns.
//!
//! A pattern is an exact URL, a prefix, or a regular expression; a target
//! is accepted iff it matches at least one configured pattern. The
//! textual forms are:
//!
//! - `re:<regex>` — regular expression over the full target URL
//! - `prefix:<url>` — literal prefix match
//! - anything else — exact match against the target's base form
//!   (query and fragment stripped)

use std::fmt;

use crate::{Result, SluiceError};

/// One whitelist entry for a broker's target set.
#[derive(Debug, Clone)]
pub enum TargetPattern {
    Exact(String),
    Prefix(String),
    Regex(regex::Regex),
}

impl TargetPattern {
    /// Parse the textual form. A malformed regex is a validation error.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(SluiceError::Validation("empty target pattern".into()));
        }
        if let Some(expr) = spec.strip_prefix("re:") {
            let regex = regex::Regex::new(expr)
                .map_err(|e| SluiceError::Validation(format!("invalid pattern regex: {e}")))?;
            Ok(TargetPattern::Regex(regex))
        } else if let Some(prefix) = spec.strip_prefix("prefix:") {
            Ok(TargetPattern::Prefix(prefix.to_string()))
        } else {
            Ok(TargetPattern::Exact(spec.to_string()))
        }
    }

    /// Whether a target URL matches this pattern.
    ///
    /// Exact patterns compare against the target's base form (query and
    /// fragment stripped), so `https://api.example.org/search?q=x` still
    /// matches the configured `https://api.example.org/search`.
    pub fn matches(&self, target: &str) -> bool {
        match self {
            TargetPattern::Exact(url) => base_form(target) == *url,
            TargetPattern::Prefix(prefix) => target.starts_with(prefix.as_str()),
            TargetPattern::Regex(regex) => regex.is_match(target),
        }
    }

    /// Canonical textual form, used to build the normalized set key.
    pub fn key(&self) -> String {
        match self {
            TargetPattern::Exact(url) => format!("exact:{url}"),
            TargetPattern::Prefix(prefix) => format!("prefix:{prefix}"),
            TargetPattern::Regex(regex) => format!("re:{}", regex.as_str()),
        }
    }
}

impl fmt::Display for TargetPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Strip query and fragment from a target URL.
fn base_form(target: &str) -> &str {
    let end = target
        .find(['?', '#'])
        .unwrap_or(target.len());
    &target[..end]
}

/// Parse and normalize a pattern set: sorted, deduplicated canonical keys
/// joined into one identity string, plus the compiled patterns.
///
/// Two calls with the same patterns in any order or spelling produce the
/// same key, which is what makes registry construction idempotent.
pub fn normalize_set(specs: &[String]) -> Result<(String, Vec<TargetPattern>)> {
    if specs.is_empty() {
        return Err(SluiceError::Validation(
            "at least one target pattern is required".into(),
        ));
    }
    let mut patterns: Vec<TargetPattern> = Vec::with_capacity(specs.len());
    for spec in specs {
        patterns.push(TargetPattern::parse(spec)?);
    }
    let mut keys: Vec<String> = patterns.iter().map(TargetPattern::key).collect();
    keys.sort();
    keys.dedup();
    Ok((keys.join("\n"), patterns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_ignores_query_and_fragment() {
        let p = TargetPattern::parse("https://api.example.org/search").unwrap();
        assert!(p.matches("https://api.example.org/search"));
        assert!(p.matches("https://api.example.org/search?q=rust"));
        assert!(p.matches("https://api.example.org/search#frag"));
        assert!(!p.matches("https://api.example.org/other"));
        assert!(!p.matches("https://api.example.org/search/sub"));
    }

    #[test]
    fn prefix_matches_subpaths() {
        let p = TargetPattern::parse("prefix:https://api.example.org").unwrap();
        assert!(p.matches("https://api.example.org/anything/below"));
        assert!(!p.matches("https://other.example.org/"));
    }

    #[test]
    fn regex_matches_full_target() {
        let p = TargetPattern::parse(r"re:^https://api\.example\.org/v\d+/").unwrap();
        assert!(p.matches("https://api.example.org/v1/users"));
        assert!(p.matches("https://api.example.org/v22/users"));
        assert!(!p.matches("https://api.example.org/users"));
    }

    #[test]
    fn malformed_regex_is_a_validation_error() {
        let err = TargetPattern::parse("re:(unclosed").unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn empty_pattern_rejected() {
        assert!(TargetPattern::parse("  ").is_err());
    }

    #[test]
    fn set_key_is_order_independent() {
        let a = normalize_set(&[
            "https://one.example.org".to_string(),
            "prefix:https://two.example.org".to_string(),
        ])
        .unwrap();
        let b = normalize_set(&[
            "prefix:https://two.example.org".to_string(),
            "https://one.example.org".to_string(),
        ])
        .unwrap();
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn set_key_deduplicates() {
        let (key, _) = normalize_set(&[
            "https://one.example.org".to_string(),
            "https://one.example.org".to_string(),
        ])
        .unwrap();
        assert_eq!(key, "exact:https://one.example.org");
    }

    #[test]
    fn empty_set_rejected() {
        assert!(normalize_set(&[]).is_err());
    }
}
