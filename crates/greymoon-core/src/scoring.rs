//! Weighted lead scoring.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RawListing;

pub const MAX_SCORE: u32 = 100;

pub const PHONE_POINTS: u32 = 25;
pub const EMAIL_POINTS: u32 = 15;
pub const ZIP_POINTS: u32 = 5;
pub const GEOLOCATION_POINTS: u32 = 10;
pub const PREMIUM_CATEGORY_POINTS: u32 = 10;
pub const URGENCY_POINTS: u32 = 15;
pub const FRESHNESS_POINTS: u32 = 10;

const FRESHNESS_WINDOW_HOURS: i64 = 24;

pub const DEFAULT_PREMIUM_CATEGORIES: &[&str] = &[
    "hss", // household services
    "skd", // skilled trade
];

pub const DEFAULT_URGENCY_KEYWORDS: &[&str] = &["emergency", "urgent", "asap", "immediately"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub premium_categories: Vec<String>,
    pub urgency_keywords: Vec<String>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            premium_categories: DEFAULT_PREMIUM_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            urgency_keywords: DEFAULT_URGENCY_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScoreBreakdown {
    pub score: u32,
    pub reasons: BTreeMap<String, u32>,
}

impl ScoreBreakdown {
    fn add(&mut self, reason: &str, points: u32) {
        self.score += points;
        self.reasons.insert(reason.to_string(), points);
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeadScorer {
    rules: ScoringRules,
}

impl LeadScorer {
    pub fn new(rules: ScoringRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Score a listing as of `now`. The rules are additive and independent;
    /// the sum is capped at [`MAX_SCORE`]. Only freshness depends on `now`.
    pub fn score(&self, listing: &RawListing, now: DateTime<Utc>) -> ScoreBreakdown {
        let mut breakdown = ScoreBreakdown::default();

        let title = listing.title_text().to_lowercase();
        let description = listing.description_text().to_lowercase();

        if listing
            .phone_numbers
            .as_ref()
            .is_some_and(|phones| !phones.is_empty())
        {
            breakdown.add("phone", PHONE_POINTS);
        }

        if description.contains('@') {
            breakdown.add("email", EMAIL_POINTS);
        }

        if description.chars().any(char::is_numeric) {
            breakdown.add("zip", ZIP_POINTS);
        }

        if listing.has_coordinates() {
            breakdown.add("geolocation", GEOLOCATION_POINTS);
        }

        if let Some(category) = listing.category.as_deref() {
            if self.rules.premium_categories.iter().any(|c| c == category) {
                breakdown.add("premium_category", PREMIUM_CATEGORY_POINTS);
            }
        }

        // First matching keyword wins; urgency never stacks.
        if self.rules.urgency_keywords.iter().any(|word| {
            let word = word.to_lowercase();
            title.contains(&word) || description.contains(&word)
        }) {
            breakdown.add("urgency", URGENCY_POINTS);
        }

        if let Some(posted_at) = listing.datetime.as_deref().and_then(parse_posted_at) {
            if now - posted_at < Duration::hours(FRESHNESS_WINDOW_HOURS) {
                breakdown.add("freshness", FRESHNESS_POINTS);
            }
        }

        breakdown.score = breakdown.score.min(MAX_SCORE);
        breakdown
    }
}

/// Parse an ISO-8601 timestamp carrying an offset (`Z`, `+00:00` or `+0000`).
/// Offset-less timestamps are rejected and never earn the freshness bonus.
pub fn parse_posted_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let raw = match raw.strip_suffix(['Z', 'z']) {
        Some(head) => format!("{head}+00:00"),
        None => raw.to_string(),
    };
    ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&raw, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Lenient parse used when persisting `posted_at`; naive values are read as UTC.
pub fn parse_stored_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_posted_at(raw).or_else(|| {
        let raw = raw.trim();
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    })
}
