use async_trait::async_trait;
use chrono::Utc;
use greymoon_core::{RunStatus, ScrapeRun};
use tokio::sync::Mutex;

use crate::{StoreError, StoreResult};

/// Result of a status write against the monotonic transition guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The run was already terminal; nothing was written.
    AlreadyTerminal(RunStatus),
}

/// Lifecycle records for scrape runs.
///
/// Status only moves `RUNNING -> terminal`, once. Both the poller's `finish`
/// and an external `abort` go through the same guard, so whichever lands
/// first wins and `finished_at` is written exactly once.
#[async_trait]
pub trait RunTracker: Send + Sync {
    async fn create(&self, run_id: &str, dataset_id: Option<&str>) -> StoreResult<ScrapeRun>;

    /// Add `delta_accepted` to the collected count; returns the new count.
    async fn record_progress(&self, run_id: &str, delta_accepted: u64) -> StoreResult<u64>;

    async fn finish(&self, run_id: &str, status: RunStatus) -> StoreResult<Transition>;

    async fn abort(&self, run_id: &str) -> StoreResult<Transition>;

    async fn get(&self, run_id: &str) -> StoreResult<Option<ScrapeRun>>;

    /// Most recently created run.
    async fn latest(&self) -> StoreResult<Option<ScrapeRun>>;

    /// Newest first.
    async fn history(&self, limit: usize) -> StoreResult<Vec<ScrapeRun>>;
}

#[derive(Debug, Default)]
pub struct MemoryRunTracker {
    runs: Mutex<Vec<ScrapeRun>>,
}

impl MemoryRunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transition(&self, run_id: &str, status: RunStatus) -> StoreResult<Transition> {
        if !status.is_terminal() {
            return Err(StoreError::NotTerminal(status));
        }
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|run| run.run_id == run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        if run.status.is_terminal() {
            return Ok(Transition::AlreadyTerminal(run.status));
        }
        run.status = status;
        run.finished_at = Some(Utc::now());
        Ok(Transition::Applied)
    }
}

#[async_trait]
impl RunTracker for MemoryRunTracker {
    async fn create(&self, run_id: &str, dataset_id: Option<&str>) -> StoreResult<ScrapeRun> {
        let mut runs = self.runs.lock().await;
        if runs.iter().any(|run| run.run_id == run_id) {
            return Err(StoreError::RunExists(run_id.to_string()));
        }
        let run = ScrapeRun::new(run_id, dataset_id.map(str::to_string), Utc::now());
        runs.push(run.clone());
        Ok(run)
    }

    async fn record_progress(&self, run_id: &str, delta_accepted: u64) -> StoreResult<u64> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|run| run.run_id == run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        run.leads_collected = run.leads_collected.saturating_add(delta_accepted);
        Ok(run.leads_collected)
    }

    async fn finish(&self, run_id: &str, status: RunStatus) -> StoreResult<Transition> {
        self.transition(run_id, status).await
    }

    async fn abort(&self, run_id: &str) -> StoreResult<Transition> {
        self.transition(run_id, RunStatus::Aborted).await
    }

    async fn get(&self, run_id: &str) -> StoreResult<Option<ScrapeRun>> {
        let runs = self.runs.lock().await;
        Ok(runs.iter().find(|run| run.run_id == run_id).cloned())
    }

    async fn latest(&self) -> StoreResult<Option<ScrapeRun>> {
        Ok(self.runs.lock().await.last().cloned())
    }

    async fn history(&self, limit: usize) -> StoreResult<Vec<ScrapeRun>> {
        let runs = self.runs.lock().await;
        Ok(runs.iter().rev().take(limit).cloned().collect())
    }
}
