use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use crate::data::types::ForecastItem;
use crate::storage::{SnapshotStore, StoreError};

// TEXT comparison orders like time only for four-digit years; callers keep
// stored instants at or before `latest_expiry()`.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// 9999-12-31T23:59:59Z. Later years format as `+YYYYY` and sort first.
fn latest_expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .expect("valid calendar date")
}

/// Durable snapshot store. One row per date, JSON payload.
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotStore {
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(db_path)?)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                date TEXT PRIMARY KEY,
                items TEXT NOT NULL,
                item_count INTEGER NOT NULL,
                written_at TIMESTAMP NOT NULL,
                expires_at TIMESTAMP NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_expires_at ON snapshots(expires_at);
            "#
        )?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn get_at(&self, date: &str, now: DateTime<Utc>) -> Result<Option<Vec<ForecastItem>>, StoreError> {
        let conn = self.lock()?;

        let payload: Option<String> = conn
            .query_row(
                "SELECT items FROM snapshots WHERE date = ?1 AND expires_at > ?2",
                params![date, timestamp(now)],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put_at(
        &self,
        date: &str,
        items: &[ForecastItem],
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(items)?;
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let latest = latest_expiry();
        let expires_at = now
            .checked_add_signed(ttl)
            .map_or(latest, |at| at.min(latest));

        self.lock()?.execute(
            "INSERT OR REPLACE INTO snapshots (date, items, item_count, written_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                date,
                json,
                items.len() as i64,
                timestamp(now),
                timestamp(expires_at),
            ],
        )?;

        Ok(())
    }

    /// Delete expired snapshots. Returns how many rows went.
    pub fn prune_expired(&self) -> Result<usize, StoreError> {
        let removed = self.lock()?.execute(
            "DELETE FROM snapshots WHERE expires_at <= ?1",
            params![timestamp(Utc::now())],
        )?;

        info!("Pruned {} expired snapshots", removed);
        Ok(removed)
    }

    /// Count snapshots that have not expired yet.
    pub fn count_live(&self) -> Result<usize, StoreError> {
        let count: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE expires_at > ?1",
            params![timestamp(Utc::now())],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    async fn get(&self, date: &str) -> Result<Option<Vec<ForecastItem>>, StoreError> {
        self.get_at(date, Utc::now())
    }

    async fn put(&self, date: &str, items: &[ForecastItem], ttl: Duration) -> Result<(), StoreError> {
        self.put_at(date, items, ttl, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::Source;

    fn items() -> Vec<ForecastItem> {
        vec![
            ForecastItem::new(Source::Polymarket, "Fed raises rates in March 42%", 42),
            ForecastItem::new(Source::Kalshi, "CPI print above 3% $0.67", 67),
        ]
    }

    const TWO_WEEKS: Duration = Duration::from_secs(1_209_600);

    #[tokio::test]
    async fn test_roundtrip_and_miss() {
        let store = SqliteSnapshotStore::in_memory().unwrap();
        store.put("2024-03-01", &items(), TWO_WEEKS).await.unwrap();

        assert_eq!(store.get("2024-03-01").await.unwrap(), Some(items()));
        assert_eq!(store.get("2024-03-02").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_same_date() {
        let store = SqliteSnapshotStore::in_memory().unwrap();
        store.put("2024-03-01", &items(), TWO_WEEKS).await.unwrap();
        store.put("2024-03-01", &items()[..1], TWO_WEEKS).await.unwrap();

        assert_eq!(store.get("2024-03-01").await.unwrap().unwrap().len(), 1);
        assert_eq!(store.count_live().unwrap(), 1);
    }

    #[test]
    fn test_expired_rows_are_hidden_and_pruned() {
        let store = SqliteSnapshotStore::in_memory().unwrap();
        let written = Utc::now() - chrono::Duration::days(15);
        store.put_at("2024-03-01", &items(), TWO_WEEKS, written).unwrap();
        store.put_at("2024-03-20", &items(), TWO_WEEKS, Utc::now()).unwrap();

        assert_eq!(store.get_at("2024-03-01", Utc::now()).unwrap(), None);
        assert_eq!(store.count_live().unwrap(), 1);
        assert_eq!(store.prune_expired().unwrap(), 1);
        assert!(store.get_at("2024-03-20", Utc::now()).unwrap().is_some());
    }

    #[test]
    fn test_huge_ttl_is_clamped_and_stays_live() {
        let store = SqliteSnapshotStore::in_memory().unwrap();
        // tens of thousands of years, past what four-digit timestamps hold
        store.put_at("2024-03-01", &items(), Duration::from_secs(1_000_000_000_000), Utc::now()).unwrap();
        store.put_at("2024-03-02", &items(), Duration::from_secs(u64::MAX), Utc::now()).unwrap();

        let expires: Vec<String> = {
            let conn = store.lock().unwrap();
            let mut stmt = conn.prepare("SELECT expires_at FROM snapshots ORDER BY date").unwrap();
            let rows = stmt.query_map([], |row| row.get(0)).unwrap();
            let expires = rows.collect::<Result<Vec<String>, _>>().unwrap();
            expires
        };
        assert_eq!(expires[0], "9999-12-31T23:59:59Z");
        assert!(expires[1].starts_with("2"), "{}", expires[1]);

        assert_eq!(store.get_at("2024-03-01", Utc::now()).unwrap(), Some(items()));
        assert_eq!(store.count_live().unwrap(), 2);
        assert_eq!(store.prune_expired().unwrap(), 0);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecasts.db");
        let path = path.to_str().unwrap();

        SqliteSnapshotStore::new(path)
            .unwrap()
            .put_at("2024-03-01", &items(), TWO_WEEKS, Utc::now())
            .unwrap();

        let reopened = SqliteSnapshotStore::new(path).unwrap();
        assert_eq!(reopened.get_at("2024-03-01", Utc::now()).unwrap(), Some(items()));
    }
}
