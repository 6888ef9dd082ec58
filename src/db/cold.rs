//! SQLite cold tier.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};

use super::codec::decompress_payload;
use super::models::*;
use super::StoreError;
use crate::config::{is_valid_table_name, TierTables};
use crate::measurement::UserTier;

/// Thread-safe cold store. One table per user tier holds
/// `(id, created_at bucket, gzip payload)` rows.
#[derive(Clone)]
pub struct ColdStore {
    conn: Arc<Mutex<Connection>>,
    tables: TierTables,
}

impl ColdStore {
    /// Open (or create) the cold store at `path`.
    pub fn new<P: AsRef<Path>>(path: P, tables: TierTables) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            tables,
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();

        conn.execute_batch(include_str!("../../migrations/0001_offload_retry_jobs.sql"))
            .map_err(|e| StoreError::Migration(format!("retry jobs table: {}", e)))?;

        for tier in UserTier::ALL {
            let table = self.table(tier)?;
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    data BLOB NOT NULL,
                    PRIMARY KEY (id, created_at)
                )"
            ))
            .map_err(|e| StoreError::Migration(format!("table {}: {}", table, e)))?;
        }

        Ok(())
    }

    fn table(&self, tier: UserTier) -> Result<&str, StoreError> {
        let table = self.tables.table_for(tier);
        if !is_valid_table_name(table) {
            return Err(StoreError::Migration(format!("invalid table name {:?}", table)));
        }
        Ok(table)
    }

    /// Run `f` against this store on the blocking thread pool.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ColdStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    // --- Archived measurements ---

    /// Insert rows, skipping any `(id, created_at)` already present.
    /// Returns the number of rows actually written.
    pub fn insert_measurements(&self, tier: UserTier, rows: &[OffloadRow]) -> Result<usize, StoreError> {
        let table = self.table(tier)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {table} (id, created_at, data) VALUES (?1, ?2, ?3)"
            ))?;
            for row in rows {
                inserted += stmt.execute(params![row.id, row.created_at.timestamp(), row.data])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Fetch and decompress one archived record.
    pub fn get_measurement_string(
        &self,
        id: &str,
        tier: UserTier,
        bucket: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let table = self.table(tier)?;
        let data: Option<Vec<u8>> = {
            let conn = self.conn.lock();
            conn.query_row(
                &format!("SELECT data FROM {table} WHERE id = ?1 AND created_at = ?2"),
                params![id, bucket.timestamp()],
                |row| row.get(0),
            )
            .optional()?
        };

        data.map(|data| decompress_payload(&data)).transpose()
    }

    // --- Retry jobs ---

    /// Record a failed batch for later retry.
    pub fn add_retry_job(
        &self,
        tier: UserTier,
        measurement_ids: &[String],
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<i64, StoreError> {
        let ids = serde_json::to_string(measurement_ids)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO offload_retry_jobs (tier, measurement_ids, attempts, next_attempt_at, last_error) VALUES (?1, ?2, 0, ?3, ?4)",
            params![tier.as_str(), ids, next_attempt_at.timestamp(), error],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Jobs whose next attempt is due, oldest first.
    pub fn due_retry_jobs(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<RetryJob>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, tier, measurement_ids, attempts, next_attempt_at, last_error
             FROM offload_retry_jobs WHERE next_attempt_at <= ?1
             ORDER BY next_attempt_at, id LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![now.timestamp(), limit as i64], raw_retry_job)?
            .collect::<SqlResult<Vec<_>>>()?;
        rows.into_iter().map(RawRetryJob::into_job).collect()
    }

    /// All pending jobs.
    pub fn retry_jobs(&self) -> Result<Vec<RetryJob>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, tier, measurement_ids, attempts, next_attempt_at, last_error
             FROM offload_retry_jobs ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], raw_retry_job)?
            .collect::<SqlResult<Vec<_>>>()?;
        rows.into_iter().map(RawRetryJob::into_job).collect()
    }

    pub fn delete_retry_job(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM offload_retry_jobs WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Push a job back after a failed attempt.
    pub fn reschedule_retry_job(
        &self,
        id: i64,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE offload_retry_jobs SET attempts = ?1, next_attempt_at = ?2, last_error = ?3 WHERE id = ?4",
            params![attempts, next_attempt_at.timestamp(), error, id],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn drop_table(&self, tier: UserTier) -> Result<(), StoreError> {
        let table = self.table(tier)?.to_string();
        self.conn.lock().execute_batch(&format!("DROP TABLE {table}"))?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn restore_tables(&self) -> Result<(), StoreError> {
        self.init()
    }
}

struct RawRetryJob {
    id: i64,
    tier: String,
    measurement_ids: String,
    attempts: u32,
    next_attempt_at: i64,
    last_error: Option<String>,
}

fn raw_retry_job(row: &rusqlite::Row<'_>) -> SqlResult<RawRetryJob> {
    Ok(RawRetryJob {
        id: row.get(0)?,
        tier: row.get(1)?,
        measurement_ids: row.get(2)?,
        attempts: row.get(3)?,
        next_attempt_at: row.get(4)?,
        last_error: row.get(5)?,
    })
}

impl RawRetryJob {
    fn into_job(self) -> Result<RetryJob, StoreError> {
        let tier = UserTier::from_name(&self.tier)
            .ok_or_else(|| StoreError::Backend(format!("unknown tier {:?} in retry job {}", self.tier, self.id)))?;
        Ok(RetryJob {
            id: self.id,
            tier,
            measurement_ids: serde_json::from_str(&self.measurement_ids)?,
            attempts: self.attempts,
            next_attempt_at: DateTime::from_timestamp(self.next_attempt_at, 0).unwrap_or_default(),
            last_error: self.last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::compress_payload;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    fn open() -> (tempfile::TempDir, ColdStore) {
        let dir = tempdir().unwrap();
        let store = ColdStore::new(dir.path().join("cold.db"), TierTables::default()).unwrap();
        (dir, store)
    }

    fn row(id: &str, bucket: DateTime<Utc>, payload: &str) -> OffloadRow {
        OffloadRow {
            id: id.to_string(),
            created_at: bucket,
            data: compress_payload(payload).unwrap(),
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let (_dir, store) = open();
        let bucket = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();

        let n = store
            .insert_measurements(UserTier::Member, &[row("a", bucket, r#"{"id":"a"}"#), row("b", bucket, "{}")])
            .unwrap();
        assert_eq!(n, 2);

        let got = store.get_measurement_string("a", UserTier::Member, bucket).unwrap();
        assert_eq!(got.as_deref(), Some(r#"{"id":"a"}"#));

        // Wrong tier or wrong bucket is a miss.
        assert!(store.get_measurement_string("a", UserTier::Anonymous, bucket).unwrap().is_none());
        let other = bucket + Duration::hours(1);
        assert!(store.get_measurement_string("a", UserTier::Member, other).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_rows_are_ignored() {
        let (_dir, store) = open();
        let bucket = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();

        store.insert_measurements(UserTier::Special, &[row("a", bucket, "first")]).unwrap();
        let n = store.insert_measurements(UserTier::Special, &[row("a", bucket, "second")]).unwrap();
        assert_eq!(n, 0);

        let got = store.get_measurement_string("a", UserTier::Special, bucket).unwrap();
        assert_eq!(got.as_deref(), Some("first"));
    }

    #[test]
    fn test_retry_job_lifecycle() {
        let (_dir, store) = open();
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        let ids = vec!["x".to_string(), "y".to_string()];

        let id = store.add_retry_job(UserTier::Anonymous, &ids, now, "disk full").unwrap();
        store
            .add_retry_job(UserTier::Member, &ids, now + Duration::minutes(5), "later")
            .unwrap();

        let due = store.due_retry_jobs(now, 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);
        assert_eq!(due[0].tier, UserTier::Anonymous);
        assert_eq!(due[0].measurement_ids, ids);
        assert_eq!(due[0].last_error.as_deref(), Some("disk full"));

        assert_ok!(store.reschedule_retry_job(id, 1, now + Duration::minutes(10), "again"));
        assert!(store.due_retry_jobs(now, 10).unwrap().is_empty());

        assert_ok!(store.delete_retry_job(id));
        assert_eq!(store.retry_jobs().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blocking_runs_against_store() {
        let (_dir, store) = open();
        let now = Utc::now();
        let id = store
            .blocking(move |cold| cold.add_retry_job(UserTier::Member, &["m".to_string()], now, "err"))
            .await
            .unwrap();

        let jobs = assert_ok!(store.blocking(|cold| cold.retry_jobs()).await);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, id);
    }

    #[test]
    fn test_insert_fails_without_table() {
        let (_dir, store) = open();
        store.drop_table(UserTier::Member).unwrap();
        let bucket = Utc::now();
        assert!(store.insert_measurements(UserTier::Member, &[row("a", bucket, "{}")]).is_err());

        store.restore_tables().unwrap();
        assert_eq!(store.insert_measurements(UserTier::Member, &[row("a", bucket, "{}")]).unwrap(), 1);
    }
}
