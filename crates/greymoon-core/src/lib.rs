//! Core domain model for Greymoon lead ingestion: leads, scrape runs and the
//! typed view of a raw dataset item, plus the pure fingerprint/scoring logic.

pub mod contact;
pub mod fingerprint;
pub mod scoring;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

pub use contact::{extract_email, extract_zip};
pub use fingerprint::content_hash;
pub use scoring::{
    parse_posted_at, parse_stored_timestamp, LeadScorer, ScoreBreakdown, ScoringRules,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} status `{value}`")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

/// Reviewer-facing workflow state of a lead. The pipeline only ever writes `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Won,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::Qualified => "QUALIFIED",
            LeadStatus::Won => "WON",
            LeadStatus::Lost => "LOST",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(LeadStatus::New),
            "CONTACTED" => Ok(LeadStatus::Contacted),
            "QUALIFIED" => Ok(LeadStatus::Qualified),
            "WON" => Ok(LeadStatus::Won),
            "LOST" => Ok(LeadStatus::Lost),
            _ => Err(ParseStatusError {
                kind: "lead",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle of one scraping run. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Aborted,
    TimedOut,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
            RunStatus::Aborted => "ABORTED",
            RunStatus::TimedOut => "TIMED_OUT",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCEEDED" => Ok(RunStatus::Succeeded),
            "FAILED" => Ok(RunStatus::Failed),
            "ABORTED" => Ok(RunStatus::Aborted),
            "TIMED_OUT" => Ok(RunStatus::TimedOut),
            _ => Err(ParseStatusError {
                kind: "run",
                value: s.to_string(),
            }),
        }
    }
}

/// Typed view of one dataset item as emitted by the scraping actor.
///
/// Every field is optional; `raw` keeps the untouched JSON for audit/replay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListing {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub longitude: Option<String>,
    #[serde(default, rename = "mapAccuracy", deserialize_with = "lenient_text")]
    pub map_accuracy: Option<String>,
    #[serde(default, rename = "phoneNumbers")]
    pub phone_numbers: Option<Vec<String>>,
    #[serde(skip)]
    pub raw: JsonValue,
}

impl RawListing {
    /// Parse a dataset item, keeping the original value as `raw`.
    pub fn from_value(value: JsonValue) -> Result<Self, serde_json::Error> {
        let mut listing: RawListing = serde_json::from_value(value.clone())?;
        listing.raw = value;
        Ok(listing)
    }

    /// The source-assigned identifier; blank ids count as missing.
    pub fn external_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }

    pub fn title_text(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn description_text(&self) -> &str {
        self.post.as_deref().unwrap_or_default()
    }

    pub fn first_phone(&self) -> Option<&str> {
        self.phone_numbers
            .as_ref()
            .and_then(|phones| phones.first())
            .map(String::as_str)
    }

    pub fn has_coordinates(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.latitude) && present(&self.longitude)
    }

    /// Coordinates as floats, when both parse.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.latitude.as_deref()?.trim().parse::<f64>().ok()?;
        let lon = self.longitude.as_deref()?.trim().parse::<f64>().ok()?;
        Some((lat, lon))
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s)),
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// A deduplicated, scored listing as persisted in the lead store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub external_id: String,
    pub content_hash: String,
    pub url: Option<String>,
    pub title: String,
    pub body: String,
    pub category: Option<String>,
    pub label: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub map_accuracy: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub zip_code: Option<String>,
    pub state: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub status: LeadStatus,
    pub score: u32,
    pub score_reasons: BTreeMap<String, u32>,
    pub raw_payload: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle record of one scraping run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub run_id: String,
    pub dataset_id: Option<String>,
    pub status: RunStatus,
    pub leads_collected: u64,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScrapeRun {
    pub fn new(run_id: impl Into<String>, dataset_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            dataset_id,
            status: RunStatus::Running,
            leads_collected: 0,
            created_at: now,
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_accepts_numeric_ids_and_coordinates() {
        let listing = RawListing::from_value(json!({
            "id": 7712345,
            "title": "Deep cleaning",
            "latitude": 34.05,
            "longitude": "-118.24",
            "phoneNumbers": ["555-1234", "555-9999"],
        }))
        .expect("parse");

        assert_eq!(listing.external_id(), Some("7712345"));
        assert_eq!(listing.first_phone(), Some("555-1234"));
        assert!(listing.has_coordinates());
        assert_eq!(listing.coordinates(), Some((34.05, -118.24)));
        assert_eq!(listing.raw["title"], "Deep cleaning");
    }

    #[test]
    fn blank_id_counts_as_missing() {
        let listing = RawListing::from_value(json!({ "id": "  ", "title": "x" })).expect("parse");
        assert_eq!(listing.external_id(), None);
    }

    #[test]
    fn non_object_item_is_malformed() {
        assert!(RawListing::from_value(json!("just a string")).is_err());
        assert!(RawListing::from_value(json!({ "id": ["nested"] })).is_err());
    }

    #[test]
    fn statuses_round_trip_through_text() {
        for status in [
            RunStatus::Running,
            RunStatus::Succeeded,
            RunStatus::Failed,
            RunStatus::Aborted,
            RunStatus::TimedOut,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>(), Ok(status));
        }
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::TimedOut.is_terminal());
        assert_eq!("contacted".parse::<LeadStatus>(), Ok(LeadStatus::Contacted));
        assert!("ARCHIVED".parse::<LeadStatus>().is_err());
    }
}
