//! Contact details pulled out of free-text post bodies.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex")
});

static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{5}\b").expect("zip regex"));

/// First email-looking token in `text`.
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_string())
}

/// First standalone 5-digit group in `text`.
pub fn extract_zip(text: &str) -> Option<String> {
    ZIP_RE.find(text).map(|m| m.as_str().to_string())
}
