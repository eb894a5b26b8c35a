use dashmap::DashMap;
use std::time::{Duration, Instant};
use crate::data::types::ForecastItem;
use crate::storage::{SnapshotStore, StoreError};

/// In-process store, used for tests and `backend = "memory"`.
pub struct MemorySnapshotStore {
    cache: DashMap<String, CachedSnapshot>,
}

struct CachedSnapshot {
    payload: String,
    timestamp: Instant,
    ttl: Duration,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }
}

impl Default for MemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    /// Evicts the entry on read once its TTL has passed.
    async fn get(&self, date: &str) -> Result<Option<Vec<ForecastItem>>, StoreError> {
        let payload = match self.cache.get(date) {
            Some(entry) if entry.timestamp.elapsed() > entry.ttl => {
                drop(entry); // release the shard lock before removing
                self.cache.remove(date);
                return Ok(None);
            }
            Some(entry) => entry.payload.clone(),
            None => return Ok(None),
        };

        Ok(Some(serde_json::from_str(&payload)?))
    }

    async fn put(&self, date: &str, items: &[ForecastItem], ttl: Duration) -> Result<(), StoreError> {
        let payload = serde_json::to_string(items)?;

        self.cache.insert(date.to_string(), CachedSnapshot {
            payload,
            timestamp: Instant::now(),
            ttl,
        });

        Ok(())
    }
}
