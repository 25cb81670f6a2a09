//! Canonical feature id derivation: `%03d-slug(description)`.

use std::sync::LazyLock;

use regex::Regex;

static FEATURE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}-[a-z0-9-]+$").expect("static pattern"));

/// Lowercase the description, collapse every run of non-alphanumerics into a
/// single `-`, and trim leading/trailing dashes.
pub fn slug(description: &str) -> String {
    let mut out = String::with_capacity(description.len());
    let mut pending_dash = false;

    for ch in description.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    out
}

pub fn feature_id(seq: u32, description: &str) -> String {
    format!("{:03}-{}", seq, slug(description))
}

pub fn is_valid_feature_id(candidate: &str) -> bool {
    FEATURE_ID_RE.is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_collapses_runs_and_trims() {
        assert_eq!(
            slug("Add user authentication with OAuth2 support"),
            "add-user-authentication-with-oauth2-support"
        );
        assert_eq!(slug("  Fancy!!  Name?? "), "fancy-name");
        assert_eq!(slug("---"), "");
    }

    #[test]
    fn feature_id_is_zero_padded() {
        assert_eq!(feature_id(5, "Auth flow"), "005-auth-flow");
        assert_eq!(feature_id(123, "Auth flow"), "123-auth-flow");
    }

    #[test]
    fn derived_ids_match_the_canonical_pattern() {
        let id = feature_id(1, "Add user authentication with OAuth2 support");
        assert!(is_valid_feature_id(&id));
        assert!(!is_valid_feature_id("1-auth"));
        assert!(!is_valid_feature_id("001-Auth"));
        assert!(!is_valid_feature_id("001-"));
    }
}
