//! Incremental polling of one run's dataset until the remote job terminates.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use greymoon_apify::DatasetSource;
use greymoon_core::RunStatus;
use greymoon_storage::{RunTracker, Transition};
use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, info_span, warn, Instrument};

use crate::pipeline::BatchIngestor;

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub page_size: usize,
    pub poll_interval: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What a poller saw over the lifetime of its run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollerReport {
    pub run_id: String,
    pub final_status: RunStatus,
    pub offset: usize,
    pub pages_fetched: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

pub struct DatasetPoller {
    run_id: String,
    dataset_id: String,
    source: Arc<dyn DatasetSource>,
    tracker: Arc<dyn RunTracker>,
    ingestor: Arc<BatchIngestor>,
    settings: PollerSettings,
}

impl DatasetPoller {
    pub fn new(
        run_id: impl Into<String>,
        dataset_id: impl Into<String>,
        source: Arc<dyn DatasetSource>,
        tracker: Arc<dyn RunTracker>,
        ingestor: Arc<BatchIngestor>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            dataset_id: dataset_id.into(),
            source,
            tracker,
            ingestor,
            settings,
        }
    }

    /// Run the loop on a detached task.
    pub fn spawn(self) -> PollerHandle {
        let run_id = self.run_id.clone();
        let span = info_span!("poller", run_id = %self.run_id, dataset_id = %self.dataset_id);
        let handle = tokio::spawn(self.run().instrument(span));
        PollerHandle { run_id, handle }
    }

    /// Fetch, ingest, check status, sleep; until the remote job is terminal.
    pub async fn run(self) -> PollerReport {
        let mut report = PollerReport {
            run_id: self.run_id.clone(),
            final_status: RunStatus::Running,
            offset: 0,
            pages_fetched: 0,
            accepted: 0,
            duplicates: 0,
            rejected: 0,
        };
        info!(page_size = self.settings.page_size, "polling started");

        loop {
            match self
                .source
                .fetch_page(&self.dataset_id, report.offset, self.settings.page_size)
                .await
            {
                Ok(items) => {
                    report.pages_fetched += 1;
                    if !items.is_empty() {
                        self.ingest_page(items, &mut report).await;
                    }
                }
                Err(err) => warn!(offset = report.offset, error = %err, "dataset fetch failed"),
            }

            let status = match self.source.get_status(&self.run_id).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(error = %err, "status check failed; treating run as failed");
                    RunStatus::Failed
                }
            };

            if status.is_terminal() {
                report.final_status = self.finish(status).await;
                break;
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        info!(
            status = %report.final_status,
            offset = report.offset,
            pages = report.pages_fetched,
            accepted = report.accepted,
            duplicates = report.duplicates,
            rejected = report.rejected,
            "polling finished"
        );
        report
    }

    async fn ingest_page(&self, items: Vec<serde_json::Value>, report: &mut PollerReport) {
        let returned = items.len();
        match self.ingestor.submit_batch(items, Utc::now()).await {
            Ok(summary) => {
                report.accepted += summary.accepted;
                report.duplicates += summary.duplicates;
                report.rejected += summary.rejected;
                if summary.accepted > 0 {
                    if let Err(err) = self
                        .tracker
                        .record_progress(&self.run_id, summary.accepted as u64)
                        .await
                    {
                        warn!(error = %err, "failed to record run progress");
                    }
                }
            }
            Err(err) => {
                warn!(
                    offset = report.offset,
                    items = returned,
                    error = %err,
                    "batch ingestion failed"
                );
                report.rejected += returned;
            }
        }
        report.offset += returned;
    }

    /// Record the terminal status; a run already closed (e.g. aborted) keeps its state.
    async fn finish(&self, status: RunStatus) -> RunStatus {
        match self.tracker.finish(&self.run_id, status).await {
            Ok(Transition::Applied) => status,
            Ok(Transition::AlreadyTerminal(existing)) => {
                info!(observed = %status, recorded = %existing, "run was already closed");
                existing
            }
            Err(err) => {
                warn!(status = %status, error = %err, "failed to record run completion");
                status
            }
        }
    }
}

/// A running poller bound to its run id.
#[derive(Debug)]
pub struct PollerHandle {
    run_id: String,
    handle: JoinHandle<PollerReport>,
}

impl PollerHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> Result<PollerReport, JoinError> {
        self.handle.await
    }
}
