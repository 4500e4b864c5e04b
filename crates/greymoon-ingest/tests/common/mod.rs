#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use greymoon_apify::{
    validate_selection, DatasetSource, Geocoder, JobLauncher, LaunchedRun, Place, SourceError,
};
use greymoon_core::{Lead, LeadScorer, LeadStatus, RunStatus};
use greymoon_ingest::{BatchIngestor, DuplicateFilter, Ingestor, IngestorSettings, PollerSettings};
use greymoon_storage::{MemoryLeadStore, MemoryRunTracker};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

pub fn frozen_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap()
}

pub fn fast_settings(page_size: usize) -> IngestorSettings {
    IngestorSettings {
        poller: PollerSettings {
            page_size,
            poll_interval: Duration::from_millis(1),
        },
        max_cities_per_run: 3,
        cooldown: Duration::from_millis(1),
    }
}

pub fn item(id: &str, title: &str, post: &str) -> JsonValue {
    json!({
        "id": id,
        "url": format!("https://sfbay.craigslist.org/hss/d/{id}.html"),
        "title": title,
        "post": post,
        "category": "hss",
        "location": "San Francisco",
    })
}

pub fn items(prefix: &str, n: usize) -> Vec<JsonValue> {
    (0..n)
        .map(|i| {
            item(
                &format!("{prefix}-{i}"),
                &format!("{prefix} house cleaning job {i}"),
                &format!("posting number {i} for {prefix}"),
            )
        })
        .collect()
}

pub fn stored_lead(external_id: &str, content_hash: &str) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        external_id: external_id.to_string(),
        content_hash: content_hash.to_string(),
        url: None,
        title: "already stored".to_string(),
        body: String::new(),
        category: None,
        label: None,
        location: None,
        latitude: None,
        longitude: None,
        map_accuracy: None,
        phone: None,
        email: None,
        zip_code: None,
        state: None,
        posted_at: None,
        status: LeadStatus::New,
        score: 0,
        score_reasons: BTreeMap::new(),
        raw_payload: json!({ "id": external_id }),
        created_at: frozen_now(),
    }
}

type PageScript = VecDeque<Result<Vec<JsonValue>, SourceError>>;
type StatusScript = VecDeque<Result<RunStatus, SourceError>>;

/// Dataset source driven by per-dataset page scripts and per-run status scripts.
/// Once a script runs dry, pages come back empty and statuses fall back to
/// `fallback_status`.
pub struct FakeSource {
    pages: Mutex<HashMap<String, PageScript>>,
    statuses: Mutex<HashMap<String, StatusScript>>,
    fallback_status: Mutex<RunStatus>,
    pub fetches: Mutex<Vec<(String, usize, usize)>>,
    pub aborted: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
            fallback_status: Mutex::new(RunStatus::Succeeded),
            fetches: Mutex::new(Vec::new()),
            aborted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pages(
        self,
        dataset_id: &str,
        pages: Vec<Result<Vec<JsonValue>, SourceError>>,
    ) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(dataset_id.to_string(), pages.into());
        self
    }

    pub fn with_statuses(
        self,
        run_id: &str,
        statuses: Vec<Result<RunStatus, SourceError>>,
    ) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(run_id.to_string(), statuses.into());
        self
    }

    pub fn set_fallback_status(&self, status: RunStatus) {
        *self.fallback_status.lock().unwrap() = status;
    }

    pub fn fetches_for(&self, dataset_id: &str) -> Vec<(usize, usize)> {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _, _)| d == dataset_id)
            .map(|(_, offset, limit)| (*offset, *limit))
            .collect()
    }
}

#[async_trait]
impl DatasetSource for FakeSource {
    async fn fetch_page(
        &self,
        dataset_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<JsonValue>, SourceError> {
        self.fetches
            .lock()
            .unwrap()
            .push((dataset_id.to_string(), offset, limit));
        self.pages
            .lock()
            .unwrap()
            .get_mut(dataset_id)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_status(&self, run_id: &str) -> Result<RunStatus, SourceError> {
        let scripted = self
            .statuses
            .lock()
            .unwrap()
            .get_mut(run_id)
            .and_then(|script| script.pop_front());
        scripted.unwrap_or_else(|| Ok(*self.fallback_status.lock().unwrap()))
    }

    async fn abort(&self, run_id: &str) -> Result<(), SourceError> {
        self.aborted.lock().unwrap().push(run_id.to_string());
        Ok(())
    }
}

/// Hands out `run-N` / `ds-N` for every accepted selection.
#[derive(Default)]
pub struct FakeLauncher {
    counter: AtomicUsize,
    pub selections: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl JobLauncher for FakeLauncher {
    async fn start(&self, selection: &[String]) -> Result<LaunchedRun, SourceError> {
        validate_selection(selection)?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.selections.lock().unwrap().push(selection.to_vec());
        Ok(LaunchedRun {
            run_id: format!("run-{n}"),
            dataset_id: format!("ds-{n}"),
        })
    }
}

pub struct FixedGeocoder(pub Result<Place, ()>);

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn reverse(&self, _lat: f64, _lon: f64) -> Result<Place, SourceError> {
        self.0
            .clone()
            .map_err(|_| SourceError::Network("geocoder unavailable".to_string()))
    }
}

pub struct Harness {
    pub store: Arc<MemoryLeadStore>,
    pub tracker: Arc<MemoryRunTracker>,
    pub source: Arc<FakeSource>,
    pub launcher: Arc<FakeLauncher>,
    pub ingestor: Ingestor,
}

pub fn harness(source: FakeSource, settings: IngestorSettings) -> Harness {
    harness_with_store(source, settings, MemoryLeadStore::new())
}

pub fn harness_with_store(
    source: FakeSource,
    settings: IngestorSettings,
    store: MemoryLeadStore,
) -> Harness {
    let store = Arc::new(store);
    let tracker = Arc::new(MemoryRunTracker::new());
    let source = Arc::new(source);
    let launcher = Arc::new(FakeLauncher::default());
    let batch = BatchIngestor::new(store.clone(), LeadScorer::default(), DuplicateFilter::new());
    let ingestor = Ingestor::new(
        launcher.clone(),
        source.clone(),
        tracker.clone(),
        Arc::new(batch),
        settings,
    );
    Harness {
        store,
        tracker,
        source,
        launcher,
        ingestor,
    }
}
