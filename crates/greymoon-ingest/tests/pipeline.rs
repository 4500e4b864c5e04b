mod common;

use std::sync::Arc;

use common::{frozen_now, item, stored_lead, FixedGeocoder};
use greymoon_apify::Place;
use greymoon_core::{content_hash, LeadScorer, LeadStatus};
use greymoon_ingest::{BatchIngestor, BatchSummary, DuplicateFilter, IngestRules, RelevanceGate};
use greymoon_storage::{LeadStore, MemoryLeadStore};
use serde_json::json;

fn ingestor(store: Arc<MemoryLeadStore>) -> BatchIngestor {
    BatchIngestor::new(store, LeadScorer::default(), DuplicateFilter::new())
}

#[tokio::test]
async fn three_item_batch_keeps_only_the_new_listing() {
    let store = Arc::new(MemoryLeadStore::new());
    store
        .insert_if_absent(&stored_lead("100", "some-other-hash"))
        .await
        .unwrap();

    let summary = ingestor(store.clone())
        .submit_batch(
            vec![
                json!({"title": "no id here", "post": "plumbing"}),
                item("100", "already have this one", "different text"),
                item("200", "Emergency plumber needed", "leak under sink, 94110"),
            ],
            frozen_now(),
        )
        .await
        .unwrap();

    assert_eq!(
        summary,
        BatchSummary {
            accepted: 1,
            duplicates: 1,
            rejected: 1,
        }
    );
    assert_eq!(store.count().await.unwrap(), 2);

    let lead = store.get_by_external_id("200").await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::New);
    assert_eq!(lead.zip_code.as_deref(), Some("94110"));
    assert_eq!(lead.title, "Emergency plumber needed");
    assert_eq!(
        lead.content_hash,
        content_hash(
            Some("Emergency plumber needed"),
            Some("leak under sink, 94110"),
            None,
            None
        )
    );
    assert_eq!(lead.raw_payload["id"], json!("200"));
    assert_eq!(lead.created_at, frozen_now());
}

#[tokio::test]
async fn resubmitting_a_batch_accepts_nothing() {
    let store = Arc::new(MemoryLeadStore::new());
    let ingestor = ingestor(store.clone());
    let batch = vec![
        item("1", "Junk removal", "garage full of junk"),
        item("2", "Lawn mowing", "weekly lawn service"),
        item("3", "Window cleaning", "two story house"),
    ];

    let first = ingestor.submit_batch(batch.clone(), frozen_now()).await.unwrap();
    assert_eq!(first.accepted, 3);

    let second = ingestor.submit_batch(batch, frozen_now()).await.unwrap();
    assert_eq!(second.accepted, 0);
    assert_eq!(second.duplicates, 3);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn reposted_content_under_a_new_id_is_a_duplicate() {
    let store = Arc::new(MemoryLeadStore::new());
    let ingestor = ingestor(store.clone());
    ingestor
        .submit_batch(vec![item("1", "House Cleaning!", "Call me today")], frozen_now())
        .await
        .unwrap();

    let summary = ingestor
        .submit_batch(
            vec![
                item("2", "house cleaning", "call me   today"),
                item("3", "HOUSE CLEANING", "call me today."),
            ],
            frozen_now(),
        )
        .await
        .unwrap();
    assert_eq!(summary.accepted, 0);
    assert_eq!(summary.duplicates, 2);
}

#[tokio::test]
async fn malformed_items_are_rejected_without_failing_the_batch() {
    let store = Arc::new(MemoryLeadStore::new());
    let summary = ingestor(store.clone())
        .submit_batch(
            vec![
                json!("not an object"),
                json!({"id": {"nested": true}, "title": "bad id"}),
                item("ok", "Roof repair", "shingles missing"),
            ],
            frozen_now(),
        )
        .await
        .unwrap();
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.total(), 3);
}

#[tokio::test]
async fn stored_leads_carry_their_score() {
    let store = Arc::new(MemoryLeadStore::new());
    ingestor(store.clone())
        .submit_batch(
            vec![json!({
                "id": "9001",
                "title": "URGENT repair needed",
                "post": "call me at test@x.com, zip 90210",
                "phoneNumbers": ["555-1234"],
                "latitude": "34.09",
                "longitude": "-118.41",
                "category": "hss",
                "datetime": "2026-03-01T11:00:00Z",
            })],
            frozen_now(),
        )
        .await
        .unwrap();

    let lead = store.get_by_external_id("9001").await.unwrap().unwrap();
    assert_eq!(lead.score, 90);
    assert_eq!(lead.score_reasons.get("urgency"), Some(&15));
    assert_eq!(lead.phone.as_deref(), Some("555-1234"));
    assert_eq!(lead.email.as_deref(), Some("test@x.com"));
    assert_eq!(lead.zip_code.as_deref(), Some("90210"));
    assert!(lead.posted_at.is_some());
}

#[tokio::test]
async fn geocoded_zip_overrides_the_extracted_one() {
    let listing = json!({
        "id": "geo-1",
        "title": "Gutter cleaning",
        "post": "near 90001",
        "latitude": 37.77,
        "longitude": -122.41,
    });

    let store = Arc::new(MemoryLeadStore::new());
    ingestor(store.clone())
        .with_geocoder(Arc::new(FixedGeocoder(Ok(Place {
            state: Some("California".to_string()),
            zip_code: Some("94103".to_string()),
        }))))
        .submit_batch(vec![listing.clone()], frozen_now())
        .await
        .unwrap();
    let lead = store.get_by_external_id("geo-1").await.unwrap().unwrap();
    assert_eq!(lead.zip_code.as_deref(), Some("94103"));
    assert_eq!(lead.state.as_deref(), Some("California"));

    let store = Arc::new(MemoryLeadStore::new());
    let summary = ingestor(store.clone())
        .with_geocoder(Arc::new(FixedGeocoder(Err(()))))
        .submit_batch(vec![listing], frozen_now())
        .await
        .unwrap();
    assert_eq!(summary.accepted, 1);
    let lead = store.get_by_external_id("geo-1").await.unwrap().unwrap();
    assert_eq!(lead.zip_code.as_deref(), Some("90001"));
    assert_eq!(lead.state, None);
}

#[tokio::test]
async fn relevance_gate_drops_non_service_posts() {
    let rules = IngestRules::default();
    let store = Arc::new(MemoryLeadStore::new());
    let ingestor = BatchIngestor::new(
        store.clone(),
        LeadScorer::new(rules.scoring.clone()),
        DuplicateFilter::new().with_relevance_gate(RelevanceGate::new(&rules.service_keywords)),
    );

    let summary = ingestor
        .submit_batch(
            vec![
                item("1", "Need a plumber", "toilet keeps running"),
                item("2", "Selling vintage guitar", "barely played"),
            ],
            frozen_now(),
        )
        .await
        .unwrap();
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 1);
    assert!(store.get_by_external_id("2").await.unwrap().is_none());
}
