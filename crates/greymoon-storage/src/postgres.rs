//! PostgreSQL backends. Queries are checked at runtime so the crate builds
//! without a live database.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greymoon_core::{Lead, LeadStatus, RunStatus, ScrapeRun};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info};

use crate::leads::{InsertOutcome, LeadStore};
use crate::runs::{RunTracker, Transition};
use crate::{StoreError, StoreResult, MIGRATOR};

const LEAD_COLUMNS: &str = "id, external_id, content_hash, url, title, body, category, label, \
     location, latitude, longitude, map_accuracy, phone, email, zip_code, state, posted_at, \
     status, score, score_reasons, raw_payload, created_at";

const RUN_COLUMNS: &str = "run_id, dataset_id, status, leads_collected, created_at, finished_at";

/// Open a pool and bring the schema up to date.
pub async fn connect(database_url: &str) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    MIGRATOR.run(&pool).await?;
    info!("database migrations applied");
    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn lead_from_row(row: &PgRow) -> StoreResult<Lead> {
    let status: String = row.try_get("status")?;
    let score: i32 = row.try_get("score")?;
    let Json(score_reasons): Json<BTreeMap<String, u32>> = row.try_get("score_reasons")?;
    Ok(Lead {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        content_hash: row.try_get("content_hash")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        category: row.try_get("category")?,
        label: row.try_get("label")?,
        location: row.try_get("location")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        map_accuracy: row.try_get("map_accuracy")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        zip_code: row.try_get("zip_code")?,
        state: row.try_get("state")?,
        posted_at: row.try_get("posted_at")?,
        status: status
            .parse()
            .map_err(|err| StoreError::Corrupt(format!("{err}")))?,
        score: u32::try_from(score)
            .map_err(|_| StoreError::Corrupt(format!("negative score {score}")))?,
        score_reasons,
        raw_payload: row.try_get::<JsonValue, _>("raw_payload")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn known_external_ids(&self, external_ids: &[String]) -> StoreResult<HashSet<String>> {
        if external_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query("SELECT external_id FROM leads WHERE external_id = ANY($1)")
            .bind(external_ids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("external_id").map_err(StoreError::from))
            .collect()
    }

    async fn known_content_hashes(&self, hashes: &[String]) -> StoreResult<HashSet<String>> {
        if hashes.is_empty() {
            return Ok(HashSet::new());
        }
        let rows =
            sqlx::query("SELECT DISTINCT content_hash FROM leads WHERE content_hash = ANY($1)")
                .bind(hashes)
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("content_hash").map_err(StoreError::from))
            .collect()
    }

    async fn insert_if_absent(&self, lead: &Lead) -> StoreResult<InsertOutcome> {
        // The unique external_id constraint makes concurrent inserts of one id
        // collapse to a single row; the NOT EXISTS guard skips known content.
        let result = sqlx::query(
            r#"
            INSERT INTO leads (
                id, external_id, content_hash, url, title, body, category, label,
                location, latitude, longitude, map_accuracy, phone, email, zip_code,
                state, posted_at, status, score, score_reasons, raw_payload, created_at
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                   $16, $17, $18, $19, $20, $21, $22
             WHERE NOT EXISTS (SELECT 1 FROM leads WHERE content_hash = $3)
            ON CONFLICT (external_id) DO NOTHING
            "#,
        )
        .bind(lead.id)
        .bind(&lead.external_id)
        .bind(&lead.content_hash)
        .bind(&lead.url)
        .bind(&lead.title)
        .bind(&lead.body)
        .bind(&lead.category)
        .bind(&lead.label)
        .bind(&lead.location)
        .bind(&lead.latitude)
        .bind(&lead.longitude)
        .bind(&lead.map_accuracy)
        .bind(&lead.phone)
        .bind(&lead.email)
        .bind(&lead.zip_code)
        .bind(&lead.state)
        .bind(lead.posted_at)
        .bind(lead.status.as_str())
        .bind(lead.score.min(100) as i32)
        .bind(Json(&lead.score_reasons))
        .bind(&lead.raw_payload)
        .bind(lead.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(external_id = %lead.external_id, "lead already stored");
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn get_by_external_id(&self, external_id: &str) -> StoreResult<Option<Lead>> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE external_id = $1");
        let row = sqlx::query(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(lead_from_row).transpose()
    }

    async fn find_by_content_hash(&self, content_hash: &str) -> StoreResult<Vec<Lead>> {
        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE content_hash = $1 ORDER BY created_at"
        );
        let rows = sqlx::query(&sql)
            .bind(content_hash)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(lead_from_row).collect()
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<Lead>> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC LIMIT $1");
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(lead_from_row).collect()
    }

    async fn set_status(&self, external_id: &str, status: LeadStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE leads SET status = $2 WHERE external_id = $1")
            .bind(external_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> StoreResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct PgRunTracker {
    pool: PgPool,
}

impl PgRunTracker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn transition(&self, run_id: &str, status: RunStatus) -> StoreResult<Transition> {
        if !status.is_terminal() {
            return Err(StoreError::NotTerminal(status));
        }
        let result = sqlx::query(
            r#"
            UPDATE scrape_runs
               SET status = $2,
                   finished_at = $3
             WHERE run_id = $1
               AND status = 'RUNNING'
            "#,
        )
        .bind(run_id)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(Transition::Applied);
        }
        match self.get(run_id).await? {
            Some(run) => Ok(Transition::AlreadyTerminal(run.status)),
            None => Err(StoreError::RunNotFound(run_id.to_string())),
        }
    }
}

fn run_from_row(row: &PgRow) -> StoreResult<ScrapeRun> {
    let status: String = row.try_get("status")?;
    let leads_collected: i64 = row.try_get("leads_collected")?;
    Ok(ScrapeRun {
        run_id: row.try_get("run_id")?,
        dataset_id: row.try_get("dataset_id")?,
        status: status
            .parse()
            .map_err(|err| StoreError::Corrupt(format!("{err}")))?,
        leads_collected: leads_collected.max(0) as u64,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

#[async_trait]
impl RunTracker for PgRunTracker {
    async fn create(&self, run_id: &str, dataset_id: Option<&str>) -> StoreResult<ScrapeRun> {
        let sql = format!(
            r#"
            INSERT INTO scrape_runs (run_id, dataset_id, status, leads_collected, created_at)
            VALUES ($1, $2, 'RUNNING', 0, $3)
            ON CONFLICT (run_id) DO NOTHING
            RETURNING {RUN_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(run_id)
            .bind(dataset_id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => run_from_row(&row),
            None => Err(StoreError::RunExists(run_id.to_string())),
        }
    }

    async fn record_progress(&self, run_id: &str, delta_accepted: u64) -> StoreResult<u64> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE scrape_runs
               SET leads_collected = leads_collected + $2
             WHERE run_id = $1
            RETURNING leads_collected
            "#,
        )
        .bind(run_id)
        .bind(i64::try_from(delta_accepted).unwrap_or(i64::MAX))
        .fetch_optional(&self.pool)
        .await?;
        total
            .map(|t| t.max(0) as u64)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
    }

    async fn finish(&self, run_id: &str, status: RunStatus) -> StoreResult<Transition> {
        self.transition(run_id, status).await
    }

    async fn abort(&self, run_id: &str) -> StoreResult<Transition> {
        self.transition(run_id, RunStatus::Aborted).await
    }

    async fn get(&self, run_id: &str) -> StoreResult<Option<ScrapeRun>> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM scrape_runs WHERE run_id = $1");
        let row = sqlx::query(&sql)
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn latest(&self) -> StoreResult<Option<ScrapeRun>> {
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM scrape_runs ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn history(&self, limit: usize) -> StoreResult<Vec<ScrapeRun>> {
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM scrape_runs ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(run_from_row).collect()
    }
}
