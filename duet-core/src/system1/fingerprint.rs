//! Request fingerprinting: normalize, tokenize, and bucket by domain +
//! intent verb to produce the opaque key System 1 uses as its cache index.

use crate::router::keywords;
use sha2::{Digest, Sha256};

fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            normalized.push(ch);
            last_was_space = false;
        } else if !last_was_space {
            normalized.push(' ');
            last_was_space = true;
        }
    }
    normalized.trim().to_string()
}

fn intent_verb(normalized: &str) -> &str {
    normalized.split_whitespace().next().unwrap_or("unknown")
}

fn dominant_domain(text: &str) -> &'static str {
    keywords::matched_domains(text)
        .into_iter()
        .next()
        .unwrap_or("general")
}

/// Compute a request's fingerprint: `{domain}:{intent}:{content digest}`.
/// Two requests with the same normalized shape always produce the same
/// fingerprint, which is what makes this a usable cache key.
pub fn fingerprint(request: &str) -> String {
    let normalized = normalize(request);
    let domain = dominant_domain(request);
    let intent = intent_verb(&normalized);

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();
    let digest_prefix = digest.iter().take(8).map(|b| format!("{b:02x}")).collect::<String>();

    format!("{domain}:{intent}:{digest_prefix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_shape_produces_identical_fingerprint() {
        assert_eq!(fingerprint("Fix a typo"), fingerprint("fix   a typo"));
    }

    #[test]
    fn different_content_produces_different_fingerprint() {
        assert_ne!(fingerprint("fix a typo"), fingerprint("fix a bug"));
    }

    #[test]
    fn domain_bucket_is_embedded_in_the_fingerprint() {
        assert!(fingerprint("migrate the database schema").starts_with("database:"));
        assert!(fingerprint("say hello").starts_with("general:"));
    }
}
