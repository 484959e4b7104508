//! Domain pattern matching.
//!
//! Patterns are either literal hostnames (`app.example.com`) or single-prefix
//! wildcards (`*.example.com`). A wildcard covers every name strictly below its
//! suffix and never the suffix itself:
//!
//! ```
//! use catwatch_core::matcher::matches;
//!
//! assert!(matches("sub.example.com", "*.example.com"));
//! assert!(matches("a.b.example.com", "*.example.com"));
//! assert!(!matches("example.com", "*.example.com"));
//! assert!(matches("example.com", "example.com"));
//! ```
//!
//! Inputs are expected to be normalized already (see [`normalize_domain`]).

/// Prefix that marks a wildcard pattern.
pub const WILDCARD_PREFIX: &str = "*.";

/// Returns true if `pattern` covers `domain`.
///
/// Exact equality always matches. Otherwise the domain is decomposed into its
/// parent suffixes, longest first: `a.b.c.d` yields `*.b.c.d` and `*.c.d`. The
/// full domain and the bare last label are never produced.
pub fn matches(domain: &str, pattern: &str) -> bool {
    if domain == pattern {
        return true;
    }
    if !is_wildcard(pattern) {
        return false;
    }
    wildcard_candidates(domain).any(|candidate| candidate == pattern)
}

/// Iterates the wildcard patterns that would cover `domain`, longest first.
pub fn wildcard_candidates(domain: &str) -> impl Iterator<Item = String> + '_ {
    let labels: Vec<&str> = domain.split('.').collect();
    let upper = labels.len().saturating_sub(1);
    (1..upper).map(move |i| format!("{}{}", WILDCARD_PREFIX, labels[i..].join(".")))
}

/// Returns true if the pattern is a wildcard (`*.suffix`).
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.starts_with(WILDCARD_PREFIX)
}

/// Returns the suffix a wildcard covers, or the pattern itself for literals.
pub fn base_domain(pattern: &str) -> &str {
    pattern.strip_prefix(WILDCARD_PREFIX).unwrap_or(pattern)
}

/// Normalizes a raw hostname from the traffic layer.
///
/// Lowercases, trims whitespace and strips a trailing root dot. Returns `None`
/// for empty input or names containing a character that cannot appear in a
/// hostname.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    let valid = trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '*'));
    if !valid {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(matches("app.example.com", "app.example.com"));
        assert!(matches("*.example.com", "*.example.com"));
    }

    #[test]
    fn wildcard_covers_parent_suffixes() {
        assert!(matches("sub.example.com", "*.example.com"));
        assert!(matches("a.b.example.com", "*.example.com"));
        assert!(matches("a.b.example.com", "*.b.example.com"));
        assert!(matches("www.onlyfans.com", "*.onlyfans.com"));
    }

    #[test]
    fn wildcard_never_covers_ancestor_or_itself() {
        assert!(!matches("example.com", "*.example.com"));
        assert!(!matches("b.example.com", "*.a.b.example.com"));
        assert!(!matches("example.com", "*.com"));
    }

    #[test]
    fn unrelated_domain_does_not_match() {
        assert!(!matches("notarelateddomain.com", "*.example.com"));
        assert!(!matches("badexample.com", "*.example.com"));
        assert!(!matches("example.com.evil.net", "*.example.com"));
    }

    #[test]
    fn literal_pattern_only_matches_itself() {
        assert!(!matches("sub.example.com", "example.com"));
    }

    #[test]
    fn candidates_exclude_full_domain_and_last_label() {
        let candidates: Vec<String> = wildcard_candidates("a.b.c.d").collect();
        assert_eq!(candidates, vec!["*.b.c.d", "*.c.d"]);

        assert_eq!(wildcard_candidates("example.com").count(), 0);
        assert_eq!(wildcard_candidates("localhost").count(), 0);
    }

    #[test]
    fn every_parent_suffix_matches() {
        let domain = "x.y.z.example.org";
        let labels: Vec<&str> = domain.split('.').collect();
        for i in 1..labels.len() - 1 {
            let pattern = format!("*.{}", labels[i..].join("."));
            assert!(matches(domain, &pattern), "{} should cover {}", pattern, domain);
        }
    }

    #[test]
    fn base_domain_strips_wildcard() {
        assert_eq!(base_domain("*.example.com"), "example.com");
        assert_eq!(base_domain("example.com"), "example.com");
        assert!(is_wildcard("*.example.com"));
        assert!(!is_wildcard("example.com"));
    }

    #[test]
    fn normalize() {
        assert_eq!(
            normalize_domain("  WWW.Example.COM. "),
            Some("www.example.com".to_string())
        );
        assert_eq!(normalize_domain(""), None);
        assert_eq!(normalize_domain("..."), None);
        assert_eq!(normalize_domain("bad domain.com"), None);
        assert_eq!(normalize_domain("a/b.com"), None);
    }
}
