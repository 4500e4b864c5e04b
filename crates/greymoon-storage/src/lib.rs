//! Durable lead store and scrape-run tracker, with in-memory and PostgreSQL backends.

pub mod leads;
pub mod postgres;
pub mod runs;

use sqlx::migrate::Migrator;
use thiserror::Error;

pub use leads::{InsertOutcome, LeadStore, MemoryLeadStore};
pub use postgres::{connect, PgLeadStore, PgRunTracker};
pub use runs::{MemoryRunTracker, RunTracker, Transition};

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("run `{0}` not found")]
    RunNotFound(String),
    #[error("run `{0}` already exists")]
    RunExists(String),
    #[error("{0} is not a terminal run status")]
    NotTerminal(greymoon_core::RunStatus),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
