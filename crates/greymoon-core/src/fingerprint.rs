//! Content fingerprinting used to catch reposts that change their external id
//! but keep substantially the same text.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Characters of the description that take part in the fingerprint.
pub const DESCRIPTION_PREFIX_CHARS: usize = 200;

const FIELD_DELIMITER: &str = "|";

// Letters, numbers, underscore and whitespace survive; marks and punctuation go.
static STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_\s]").expect("strip regex"));

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Lowercase, trim, drop punctuation and collapse whitespace runs to one space.
pub fn normalize_text(input: &str) -> String {
    let lowered = input.to_lowercase();
    let stripped = STRIP_RE.replace_all(lowered.trim(), "");
    WHITESPACE_RE.replace_all(&stripped, " ").into_owned()
}

/// SHA-256 (hex) over the normalized `title|description[..200]|phone|email`.
///
/// The description is truncated before normalization, so two posts that only
/// differ after the first 200 characters share a fingerprint.
pub fn content_hash(
    title: Option<&str>,
    description: Option<&str>,
    phone: Option<&str>,
    email: Option<&str>,
) -> String {
    let description_prefix: String = description
        .unwrap_or_default()
        .chars()
        .take(DESCRIPTION_PREFIX_CHARS)
        .collect();

    let fingerprint = [
        normalize_text(title.unwrap_or_default()),
        normalize_text(&description_prefix),
        normalize_text(phone.unwrap_or_default()),
        normalize_text(email.unwrap_or_default()),
    ]
    .join(FIELD_DELIMITER);

    sha256_hex(fingerprint.as_bytes())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_stable() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        // Four empty fields still hash the three delimiters.
        assert_eq!(content_hash(None, None, None, None), sha256_hex(b"|||"));
    }

    #[test]
    fn normalization_ignores_case_punctuation_and_spacing() {
        assert_eq!(normalize_text("  House   CLEANING!!  "), "house cleaning");
        assert_eq!(normalize_text("Call\t\tme, now."), "call me now");

        let a = content_hash(
            Some("House Cleaning - Weekly!"),
            Some("We clean   houses. Call today"),
            Some("(555) 123-4567"),
            Some("Jo@Example.com"),
        );
        let b = content_hash(
            Some("house cleaning  weekly"),
            Some("we clean houses call today!!"),
            Some("555 1234567"),
            Some("jo@example.com"),
        );
        // Phone punctuation removal leaves "555 1234567" on both sides.
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn combining_marks_are_stripped_like_punctuation() {
        assert_eq!(normalize_text("नमस्ते!"), "नमसत");
        assert_eq!(normalize_text("Cafe\u{301} Ünïcode_ok"), "cafe ünïcode_ok");
        assert_eq!(normalize_text("call ٣ now"), "call ٣ now");
    }

    #[test]
    fn only_the_description_prefix_matters() {
        let base = "x".repeat(DESCRIPTION_PREFIX_CHARS);
        let a = content_hash(Some("t"), Some(&format!("{base} first tail")), None, None);
        let b = content_hash(Some("t"), Some(&format!("{base} other tail")), None, None);
        assert_eq!(a, b);

        let c = content_hash(Some("t"), Some("short body"), None, None);
        let d = content_hash(Some("t"), Some("short bodies"), None, None);
        assert_ne!(c, d);
    }

    #[test]
    fn contact_fields_distinguish_posts() {
        let a = content_hash(Some("Plumber"), Some("fast"), Some("555-1111"), None);
        let b = content_hash(Some("Plumber"), Some("fast"), Some("555-2222"), None);
        assert_ne!(a, b);
    }
}
