use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use greymoon_core::{Lead, LeadStatus};
use tokio::sync::Mutex;
use tracing::debug;

use crate::StoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another writer already stored this external id or content hash.
    Duplicate,
}

/// Append-only sink for leads, shared by every concurrent poller.
///
/// The `known_*` lookups are point-in-time snapshots; `insert_if_absent` is
/// the atomic step that keeps two writers from storing the same lead.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Subset of `external_ids` already stored.
    async fn known_external_ids(&self, external_ids: &[String]) -> StoreResult<HashSet<String>>;

    /// Subset of `hashes` already stored.
    async fn known_content_hashes(&self, hashes: &[String]) -> StoreResult<HashSet<String>>;

    /// Store `lead` unless its external id or content hash is already present.
    async fn insert_if_absent(&self, lead: &Lead) -> StoreResult<InsertOutcome>;

    async fn get_by_external_id(&self, external_id: &str) -> StoreResult<Option<Lead>>;

    async fn find_by_content_hash(&self, content_hash: &str) -> StoreResult<Vec<Lead>>;

    /// Newest first.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<Lead>>;

    /// Reviewer action; returns `false` when no lead has that external id.
    async fn set_status(&self, external_id: &str, status: LeadStatus) -> StoreResult<bool>;

    async fn count(&self) -> StoreResult<u64>;
}

#[derive(Debug, Default)]
struct LeadIndex {
    leads: Vec<Lead>,
    by_external_id: HashMap<String, usize>,
    by_content_hash: HashMap<String, Vec<usize>>,
}

/// Process-local store; one mutex covers both indexes so check-and-insert is atomic.
#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    inner: Mutex<LeadIndex>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn known_external_ids(&self, external_ids: &[String]) -> StoreResult<HashSet<String>> {
        let index = self.inner.lock().await;
        Ok(external_ids
            .iter()
            .filter(|id| index.by_external_id.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn known_content_hashes(&self, hashes: &[String]) -> StoreResult<HashSet<String>> {
        let index = self.inner.lock().await;
        Ok(hashes
            .iter()
            .filter(|hash| index.by_content_hash.contains_key(*hash))
            .cloned()
            .collect())
    }

    async fn insert_if_absent(&self, lead: &Lead) -> StoreResult<InsertOutcome> {
        let mut index = self.inner.lock().await;
        if index.by_external_id.contains_key(&lead.external_id)
            || index.by_content_hash.contains_key(&lead.content_hash)
        {
            debug!(external_id = %lead.external_id, "lead already stored");
            return Ok(InsertOutcome::Duplicate);
        }

        let position = index.leads.len();
        index.leads.push(lead.clone());
        index
            .by_external_id
            .insert(lead.external_id.clone(), position);
        index
            .by_content_hash
            .entry(lead.content_hash.clone())
            .or_default()
            .push(position);
        Ok(InsertOutcome::Inserted)
    }

    async fn get_by_external_id(&self, external_id: &str) -> StoreResult<Option<Lead>> {
        let index = self.inner.lock().await;
        Ok(index
            .by_external_id
            .get(external_id)
            .map(|&pos| index.leads[pos].clone()))
    }

    async fn find_by_content_hash(&self, content_hash: &str) -> StoreResult<Vec<Lead>> {
        let index = self.inner.lock().await;
        Ok(index
            .by_content_hash
            .get(content_hash)
            .map(|positions| positions.iter().map(|&pos| index.leads[pos].clone()).collect())
            .unwrap_or_default())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<Lead>> {
        let index = self.inner.lock().await;
        let mut leads = index.leads.clone();
        // Stable sort keeps insertion order among equal timestamps; reverse for newest first.
        leads.sort_by_key(|lead| lead.created_at);
        leads.reverse();
        leads.truncate(limit);
        Ok(leads)
    }

    async fn set_status(&self, external_id: &str, status: LeadStatus) -> StoreResult<bool> {
        let mut index = self.inner.lock().await;
        let Some(&pos) = index.by_external_id.get(external_id) else {
            return Ok(false);
        };
        index.leads[pos].status = status;
        Ok(true)
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.inner.lock().await.leads.len() as u64)
    }
}
