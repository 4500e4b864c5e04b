//! Batch-level duplicate and relevance filtering.

use std::collections::HashSet;

use greymoon_core::{content_hash, extract_email, RawListing};

/// A listing with its content fingerprint computed.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub listing: RawListing,
    pub content_hash: String,
    pub email: Option<String>,
}

impl Candidate {
    pub fn new(listing: RawListing) -> Self {
        let email = extract_email(listing.description_text());
        let content_hash = content_hash(
            listing.title.as_deref(),
            listing.post.as_deref(),
            listing.first_phone(),
            email.as_deref(),
        );
        Self {
            listing,
            content_hash,
            email,
        }
    }

    pub fn external_id(&self) -> Option<&str> {
        self.listing.external_id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    MissingId,
    DuplicateId,
    Irrelevant,
    DuplicateContent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCounts {
    pub missing_id: usize,
    pub duplicate_id: usize,
    pub irrelevant: usize,
    pub duplicate_content: usize,
}

impl FilterCounts {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Accepted => {}
            Verdict::MissingId => self.missing_id += 1,
            Verdict::DuplicateId => self.duplicate_id += 1,
            Verdict::Irrelevant => self.irrelevant += 1,
            Verdict::DuplicateContent => self.duplicate_content += 1,
        }
    }

    pub fn duplicates(&self) -> usize {
        self.duplicate_id + self.duplicate_content
    }

    pub fn rejected(&self) -> usize {
        self.missing_id + self.irrelevant
    }
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub accepted: Vec<Candidate>,
    pub counts: FilterCounts,
}

/// Keeps only posts whose title or body names a service keyword.
#[derive(Debug, Clone)]
pub struct RelevanceGate {
    keywords: Vec<String>,
}

impl RelevanceGate {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_relevant(&self, listing: &RawListing) -> bool {
        let combined = format!("{} {}", listing.title_text(), listing.description_text())
            .to_lowercase();
        self.keywords.iter().any(|k| combined.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateFilter {
    relevance: Option<RelevanceGate>,
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relevance_gate(mut self, gate: RelevanceGate) -> Self {
        self.relevance = Some(gate);
        self
    }

    pub fn relevance_gate_enabled(&self) -> bool {
        self.relevance.is_some()
    }

    /// Split a batch against snapshots of the stored ids and hashes. The
    /// first failing check decides an item's verdict; ids and hashes
    /// accepted earlier in the batch count as known for later items.
    pub fn partition(
        &self,
        candidates: Vec<Candidate>,
        known_ids: &HashSet<String>,
        known_hashes: &HashSet<String>,
    ) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        let mut batch_ids: HashSet<String> = HashSet::new();
        let mut batch_hashes: HashSet<String> = HashSet::new();

        for candidate in candidates {
            let verdict = self.verdict(
                &candidate,
                known_ids,
                known_hashes,
                &batch_ids,
                &batch_hashes,
            );
            outcome.counts.record(verdict);
            if let Some(id) = candidate.external_id() {
                batch_ids.insert(id.to_string());
            }
            if matches!(verdict, Verdict::Accepted | Verdict::DuplicateContent) {
                batch_hashes.insert(candidate.content_hash.clone());
            }
            if verdict == Verdict::Accepted {
                outcome.accepted.push(candidate);
            }
        }
        outcome
    }

    fn verdict(
        &self,
        candidate: &Candidate,
        known_ids: &HashSet<String>,
        known_hashes: &HashSet<String>,
        batch_ids: &HashSet<String>,
        batch_hashes: &HashSet<String>,
    ) -> Verdict {
        let Some(id) = candidate.external_id() else {
            return Verdict::MissingId;
        };
        if known_ids.contains(id) || batch_ids.contains(id) {
            return Verdict::DuplicateId;
        }
        if let Some(gate) = &self.relevance {
            if !gate.is_relevant(&candidate.listing) {
                return Verdict::Irrelevant;
            }
        }
        if known_hashes.contains(&candidate.content_hash)
            || batch_hashes.contains(&candidate.content_hash)
        {
            return Verdict::DuplicateContent;
        }
        Verdict::Accepted
    }
}
