//! One poll iteration's worth of work: parse, filter, score, persist.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use greymoon_apify::Geocoder;
use greymoon_core::{extract_zip, parse_stored_timestamp, Lead, LeadScorer, LeadStatus, RawListing};
use greymoon_storage::{InsertOutcome, LeadStore};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::filter::{Candidate, DuplicateFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.accepted + self.duplicates + self.rejected
    }
}

pub struct BatchIngestor {
    store: Arc<dyn LeadStore>,
    scorer: LeadScorer,
    filter: DuplicateFilter,
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl BatchIngestor {
    pub fn new(store: Arc<dyn LeadStore>, scorer: LeadScorer, filter: DuplicateFilter) -> Self {
        Self {
            store,
            scorer,
            filter,
            geocoder: None,
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Filter a page of dataset items against the store and persist the
    /// survivors as new leads. Fails only when the store snapshot cannot be
    /// read; per-item problems are counted instead.
    pub async fn submit_batch(
        &self,
        items: Vec<JsonValue>,
        now: DateTime<Utc>,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        let mut candidates = Vec::with_capacity(items.len());
        for item in items {
            match RawListing::from_value(item) {
                Ok(listing) => candidates.push(Candidate::new(listing)),
                Err(err) => {
                    warn!(error = %err, "skipping malformed dataset item");
                    summary.rejected += 1;
                }
            }
        }

        let ids: Vec<String> = candidates
            .iter()
            .filter_map(|c| c.external_id().map(str::to_string))
            .collect();
        let hashes: Vec<String> = candidates.iter().map(|c| c.content_hash.clone()).collect();
        let known_ids = self
            .store
            .known_external_ids(&ids)
            .await
            .context("loading known external ids")?;
        let known_hashes = self
            .store
            .known_content_hashes(&hashes)
            .await
            .context("loading known content hashes")?;

        let outcome = self.filter.partition(candidates, &known_ids, &known_hashes);
        summary.duplicates += outcome.counts.duplicates();
        summary.rejected += outcome.counts.rejected();
        debug!(
            missing_id = outcome.counts.missing_id,
            duplicate_id = outcome.counts.duplicate_id,
            irrelevant = outcome.counts.irrelevant,
            duplicate_content = outcome.counts.duplicate_content,
            candidates = outcome.accepted.len(),
            "batch filtered"
        );

        for candidate in outcome.accepted {
            let lead = self.build_lead(candidate, now).await;
            match self.store.insert_if_absent(&lead).await {
                Ok(InsertOutcome::Inserted) => {
                    debug!(external_id = %lead.external_id, score = lead.score, "lead stored");
                    summary.accepted += 1;
                }
                // Another run stored the same listing after the snapshot was taken.
                Ok(InsertOutcome::Duplicate) => summary.duplicates += 1,
                Err(err) => {
                    warn!(external_id = %lead.external_id, error = %err, "failed to store lead");
                    summary.rejected += 1;
                }
            }
        }

        info!(
            accepted = summary.accepted,
            duplicates = summary.duplicates,
            rejected = summary.rejected,
            "batch submitted"
        );
        Ok(summary)
    }

    async fn build_lead(&self, candidate: Candidate, now: DateTime<Utc>) -> Lead {
        let Candidate {
            listing,
            content_hash,
            email,
        } = candidate;
        let breakdown = self.scorer.score(&listing, now);

        let mut zip_code = extract_zip(listing.description_text());
        let mut state = None;
        if let (Some(geocoder), Some((lat, lon))) = (&self.geocoder, listing.coordinates()) {
            match geocoder.reverse(lat, lon).await {
                Ok(place) => {
                    if place.zip_code.is_some() {
                        zip_code = place.zip_code;
                    }
                    state = place.state;
                }
                Err(err) => debug!(lat, lon, error = %err, "reverse geocoding failed"),
            }
        }

        Lead {
            id: Uuid::new_v4(),
            external_id: listing.external_id().unwrap_or_default().to_string(),
            content_hash,
            url: listing.url.clone(),
            title: listing.title_text().to_string(),
            body: listing.description_text().to_string(),
            category: listing.category.clone(),
            label: listing.label.clone(),
            location: listing.location.clone(),
            latitude: listing.latitude.clone(),
            longitude: listing.longitude.clone(),
            map_accuracy: listing.map_accuracy.clone(),
            phone: listing.first_phone().map(str::to_string),
            email,
            zip_code,
            state,
            posted_at: listing.datetime.as_deref().and_then(parse_stored_timestamp),
            status: LeadStatus::New,
            score: breakdown.score,
            score_reasons: breakdown.reasons,
            raw_payload: listing.raw,
            created_at: now,
        }
    }
}
