//! Batched archival of finished measurements into the cold tier.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use super::retry::next_attempt_at;
use crate::config::Config;
use crate::db::{compress_payload, ColdStore, HotStore, OffloadRecord, OffloadRow, StoreError};
use crate::measurement::{keys, parse_measurement_id, truncate_to_bucket, UserTier};

/// Per-tier batching queues in front of the cold store.
pub struct MeasurementOffloader {
    queues: HashMap<UserTier, mpsc::Sender<OffloadRecord>>,
    writer: Arc<BatchWriter>,
}

struct BatchWriter {
    hot: Arc<dyn HotStore>,
    cold: ColdStore,
    offloaded_ttl: Duration,
    bucket: Duration,
}

impl MeasurementOffloader {
    /// Create the offloader and spawn one flush task per tier.
    pub fn new(hot: Arc<dyn HotStore>, cold: ColdStore, config: &Config) -> Self {
        let writer = Arc::new(BatchWriter {
            hot,
            cold,
            offloaded_ttl: config.offloaded_ttl,
            bucket: config.offload_bucket,
        });

        let batch_size = config.offload_batch_size.max(1);
        let mut queues = HashMap::new();
        for tier in UserTier::ALL {
            let (tx, rx) = mpsc::channel(batch_size * 4);
            tokio::spawn(run_offload_queue(
                tier,
                rx,
                writer.clone(),
                batch_size,
                config.offload_flush_interval,
            ));
            queues.insert(tier, tx);
        }

        Self { queues, writer }
    }

    /// Queue a finished record. The tier comes from the id.
    pub async fn enqueue_for_offload(&self, record: OffloadRecord) {
        let Some(parsed) = parse_measurement_id(&record.id) else {
            tracing::warn!("Offload: skipping record with foreign id {}", record.id);
            return;
        };

        let Some(queue) = self.queues.get(&parsed.tier) else {
            return;
        };
        if queue.send(record).await.is_err() {
            tracing::error!("Offload: {} queue is closed", parsed.tier.as_str());
        }
    }

    /// Compress and insert a batch, then advance the offload watermark and
    /// shorten the TTL of the hot results and meta. Returns the number of new rows.
    pub async fn insert_batch_to_db(&self, tier: UserTier, records: Vec<OffloadRecord>) -> Result<usize, StoreError> {
        self.writer.insert_batch(tier, records).await
    }

    pub(crate) fn cold(&self) -> &ColdStore {
        &self.writer.cold
    }

    pub(crate) fn hot(&self) -> &Arc<dyn HotStore> {
        &self.writer.hot
    }
}

impl BatchWriter {
    async fn insert_batch(&self, tier: UserTier, records: Vec<OffloadRecord>) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let latest = records
            .iter()
            .map(|r| r.created_at.timestamp_millis())
            .max()
            .unwrap_or_default();

        let bucket = self.bucket;
        let inserted = self
            .cold
            .blocking(move |cold| {
                let rows = records
                    .into_iter()
                    .map(|record| {
                        Ok(OffloadRow {
                            data: compress_payload(&record.payload)?,
                            created_at: truncate_to_bucket(record.created_at, bucket),
                            id: record.id,
                        })
                    })
                    .collect::<Result<Vec<_>, StoreError>>()?;
                cold.insert_measurements(tier, &rows)
            })
            .await?;

        // The rows are durable now; hot-side bookkeeping is best effort.
        if let Err(e) = self.hot.set_max(&keys::latest_offloaded(tier), latest).await {
            tracing::warn!("Offload: failed to advance {} watermark: {}", tier.as_str(), e);
        }
        // The IP list is never archived; replay needs it for the full result TTL.
        for id in &ids {
            for key in [keys::results(id), keys::meta(id)] {
                if let Err(e) = self.hot.expire(&key, self.offloaded_ttl).await {
                    tracing::warn!("Offload: failed to shorten TTL of {}: {}", key, e);
                }
            }
        }

        Ok(inserted)
    }

    /// Flush the buffer; a failed batch becomes a durable retry job.
    async fn flush(&self, tier: UserTier, buffer: &mut Vec<OffloadRecord>) {
        if buffer.is_empty() {
            return;
        }

        let batch = std::mem::take(buffer);
        let ids: Vec<String> = batch.iter().map(|r| r.id.clone()).collect();
        let count = batch.len();

        match self.insert_batch(tier, batch).await {
            Ok(inserted) => {
                tracing::debug!("Offload: archived {}/{} {} measurements", inserted, count, tier.as_str());
            }
            Err(e) => {
                tracing::error!("Offload: batch of {} {} measurements failed: {}", count, tier.as_str(), e);
                let next_attempt = next_attempt_at(Utc::now(), 0);
                let error = e.to_string();
                let queued = self
                    .cold
                    .blocking(move |cold| cold.add_retry_job(tier, &ids, next_attempt, &error))
                    .await;
                if let Err(e2) = queued {
                    tracing::error!("Offload: failed to queue retry job, {} ids lost: {}", count, e2);
                }
            }
        }
    }
}

/// Buffer records for one tier, flushing on size or when the debounce window
/// opened by the first buffered record closes. Flushes run inline, so at most
/// one is in flight per tier.
async fn run_offload_queue(
    tier: UserTier,
    mut rx: mpsc::Receiver<OffloadRecord>,
    writer: Arc<BatchWriter>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut buffer: Vec<OffloadRecord> = Vec::with_capacity(batch_size);
    let mut deadline: Option<Instant> = None;

    loop {
        let flush_at = deadline;
        tokio::select! {
            record = rx.recv() => {
                match record {
                    Some(record) => {
                        if buffer.is_empty() {
                            deadline = Some(Instant::now() + flush_interval);
                        }
                        buffer.push(record);
                        if buffer.len() >= batch_size {
                            writer.flush(tier, &mut buffer).await;
                            deadline = None;
                        }
                    }
                    None => {
                        writer.flush(tier, &mut buffer).await;
                        break;
                    }
                }
            }
            _ = async {
                match flush_at {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                writer.flush(tier, &mut buffer).await;
                deadline = None;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::TierTables;
    use crate::db::MemoryHotStore;
    use crate::measurement::generate_measurement_id;
    use tempfile::TempDir;

    type Setup = (TempDir, Arc<MemoryHotStore>, ColdStore, MeasurementOffloader);

    pub(crate) fn setup(batch_size: usize) -> Setup {
        setup_with(Config {
            offload_batch_size: batch_size,
            offload_flush_interval: Duration::from_millis(50),
            ..Config::default()
        })
    }

    fn setup_with(config: Config) -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let cold = ColdStore::new(dir.path().join("cold.db"), TierTables::default()).unwrap();
        let hot = Arc::new(MemoryHotStore::new());
        let offloader = MeasurementOffloader::new(hot.clone(), cold.clone(), &config);
        (dir, hot, cold, offloader)
    }

    fn record(tier: UserTier) -> OffloadRecord {
        let created_at = Utc::now();
        let id = generate_measurement_id(created_at, tier);
        OffloadRecord {
            payload: format!(r#"{{"id":"{id}"}}"#),
            id,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_insert_batch_sets_watermark() {
        let (_dir, hot, cold, offloader) = setup(10);
        let rec = record(UserTier::Member);
        hot.set(&keys::results(&rec.id), rec.payload.clone(), None).await.unwrap();

        let inserted = offloader.insert_batch_to_db(UserTier::Member, vec![rec.clone()]).await.unwrap();
        assert_eq!(inserted, 1);

        let bucket = truncate_to_bucket(rec.created_at, Config::default().offload_bucket);
        let stored = cold.get_measurement_string(&rec.id, UserTier::Member, bucket).unwrap();
        assert_eq!(stored, Some(rec.payload.clone()));

        let watermark = hot.get(&keys::latest_offloaded(UserTier::Member)).await.unwrap();
        assert_eq!(watermark, Some(rec.created_at.timestamp_millis().to_string()));

        // Re-inserting the same batch is a no-op.
        let again = offloader.insert_batch_to_db(UserTier::Member, vec![rec]).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn test_insert_batch_shortens_hot_ttl_but_keeps_ips() {
        let (_dir, hot, _cold, offloader) = setup_with(Config {
            offloaded_ttl: Duration::ZERO,
            ..Config::default()
        });
        let rec = record(UserTier::Anonymous);
        let ttl = Some(Duration::from_secs(3600));
        hot.set(&keys::results(&rec.id), rec.payload.clone(), ttl).await.unwrap();
        hot.set(&keys::ips(&rec.id), r#"["10.0.0.1"]"#.to_string(), ttl).await.unwrap();
        hot.set(&keys::meta(&rec.id), "{}".to_string(), ttl).await.unwrap();

        let inserted = offloader.insert_batch_to_db(UserTier::Anonymous, vec![rec.clone()]).await.unwrap();
        assert_eq!(inserted, 1);

        assert!(hot.get(&keys::results(&rec.id)).await.unwrap().is_none());
        assert!(hot.get(&keys::meta(&rec.id)).await.unwrap().is_none());
        assert_eq!(
            hot.get(&keys::ips(&rec.id)).await.unwrap().as_deref(),
            Some(r#"["10.0.0.1"]"#)
        );
    }

    #[tokio::test]
    async fn test_queue_flushes_on_size() {
        let (_dir, _hot, cold, offloader) = setup(2);
        let a = record(UserTier::Anonymous);
        let b = record(UserTier::Anonymous);
        offloader.enqueue_for_offload(a.clone()).await;
        offloader.enqueue_for_offload(b.clone()).await;

        let bucket = truncate_to_bucket(b.created_at, Config::default().offload_bucket);
        for _ in 0..50 {
            if cold.get_measurement_string(&b.id, UserTier::Anonymous, bucket).unwrap().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch was not flushed");
    }

    #[tokio::test]
    async fn test_queue_flushes_on_deadline() {
        let (_dir, _hot, cold, offloader) = setup(100);
        let rec = record(UserTier::Special);
        offloader.enqueue_for_offload(rec.clone()).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        let bucket = truncate_to_bucket(rec.created_at, Config::default().offload_bucket);
        assert!(cold.get_measurement_string(&rec.id, UserTier::Special, bucket).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_batch_creates_retry_job() {
        let (_dir, _hot, cold, offloader) = setup(1);
        cold.drop_table(UserTier::Member).unwrap();

        let rec = record(UserTier::Member);
        offloader.enqueue_for_offload(rec.clone()).await;

        for _ in 0..50 {
            let jobs = cold.retry_jobs().unwrap();
            if let Some(job) = jobs.first() {
                assert_eq!(job.tier, UserTier::Member);
                assert_eq!(job.measurement_ids, vec![rec.id.clone()]);
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no retry job recorded");
    }
}
