//! Contracts for the external scraping job and enrichment services, plus
//! their HTTP implementations (Apify REST API, Nominatim).

pub mod cities;
pub mod client;
pub mod geocode;

use async_trait::async_trait;
use greymoon_core::RunStatus;
use serde_json::Value as JsonValue;
use thiserror::Error;

pub use cities::{validate_selection, CATEGORIES, US_CITIES};
pub use client::{ApifyClient, ApifyConfig};
pub use geocode::{NominatimGeocoder, RateLimiter};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("at least one city must be selected")]
    EmptySelection,
    #[error("invalid cities: {}", .0.join(", "))]
    UnknownCities(Vec<String>),
    #[error("unrecognized remote run status `{0}`")]
    UnknownStatus(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}

/// Identifiers of a freshly started remote run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedRun {
    pub run_id: String,
    pub dataset_id: String,
}

#[async_trait]
pub trait JobLauncher: Send + Sync {
    /// Start a scrape over `selection`; rejects empty or unrecognized selections.
    async fn start(&self, selection: &[String]) -> Result<LaunchedRun, SourceError>;
}

#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Items `[offset, offset + limit)` of the dataset, possibly fewer.
    async fn fetch_page(
        &self,
        dataset_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<JsonValue>, SourceError>;

    async fn get_status(&self, run_id: &str) -> Result<RunStatus, SourceError>;

    async fn abort(&self, run_id: &str) -> Result<(), SourceError>;
}

/// Administrative area resolved from coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Place {
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<Place, SourceError>;
}

/// Map an Apify run status onto the tracker's states. Transitional remote
/// states (`READY`, `TIMING-OUT`, `ABORTING`) still count as running.
pub fn parse_remote_status(raw: &str) -> Result<RunStatus, SourceError> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "READY" | "RUNNING" | "TIMING-OUT" | "ABORTING" => Ok(RunStatus::Running),
        "SUCCEEDED" => Ok(RunStatus::Succeeded),
        "FAILED" => Ok(RunStatus::Failed),
        "ABORTED" => Ok(RunStatus::Aborted),
        "TIMED-OUT" | "TIMED_OUT" => Ok(RunStatus::TimedOut),
        _ => Err(SourceError::UnknownStatus(raw.to_string())),
    }
}
