//! Date-keyed snapshot storage.
//!
//! The pipeline only ever reads and writes whole item lists by exact
//! `YYYY-MM-DD` key; expiry is the store's job.

pub mod memory;
pub mod sqlite;

use std::future::Future;
use std::time::Duration;
use crate::data::types::ForecastItem;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Snapshot (de)serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

pub trait SnapshotStore: Send + Sync {
    /// Items stored under `date`, if present and not expired.
    fn get(&self, date: &str) -> impl Future<Output = Result<Option<Vec<ForecastItem>>, StoreError>> + Send;

    /// Replace whatever is stored under `date`; it expires after `ttl`.
    fn put(
        &self,
        date: &str,
        items: &[ForecastItem],
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
