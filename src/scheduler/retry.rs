//! Retry worker for offload batches that failed to reach the cold tier.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, Semaphore};

use super::offload::MeasurementOffloader;
use crate::config::Config;
use crate::db::{OffloadRecord, RetryJob, StoreError};
use crate::measurement::{keys, parse_measurement_id};

/// Delay before retry number `attempts + 1`: 10s doubling, capped at 5 minutes.
pub fn calculate_backoff(attempts: u32) -> Duration {
    let secs = std::cmp::min(300u64, 10u64.saturating_mul(2u64.saturating_pow(attempts)));
    Duration::from_secs(secs)
}

pub fn next_attempt_at(now: DateTime<Utc>, attempts: u32) -> DateTime<Utc> {
    let backoff = calculate_backoff(attempts);
    now + chrono::Duration::seconds(backoff.as_secs() as i64)
}

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What happened to a job after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Archived; ids no longer in the hot tier were dropped.
    Completed { archived: usize, dropped: usize },
    Rescheduled { attempts: u32 },
    Abandoned,
}

/// Polls the durable retry table and re-runs failed batches with bounded
/// concurrency.
pub struct RetryWorker {
    offloader: Arc<MeasurementOffloader>,
    max_attempts: u32,
    poll_interval: Duration,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<i64>>>,
    stop: Arc<tokio::sync::Mutex<Option<broadcast::Sender<()>>>>,
}

impl RetryWorker {
    pub fn new(offloader: Arc<MeasurementOffloader>, config: &Config) -> Self {
        Self {
            offloader,
            max_attempts: config.retry_max_attempts.max(1),
            poll_interval: config.retry_poll_interval.max(MIN_POLL_INTERVAL),
            semaphore: Arc::new(Semaphore::new(config.retry_concurrency.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            stop: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Start the polling task.
    pub fn start(self: &Arc<Self>) {
        let worker = self.clone();

        tokio::spawn(async move {
            let (tx, _) = broadcast::channel(1);
            {
                let mut stop_guard = worker.stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(worker.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        worker.process_due_jobs().await;
                    }
                }
            }
        });
    }

    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }

    /// Spawn every due job that is not already running, up to the free
    /// permits. Returns the number started.
    pub async fn process_due_jobs(&self) -> usize {
        let capacity = self.semaphore.available_permits();
        if capacity == 0 {
            return 0;
        }

        let fetch = capacity + self.in_flight.lock().len();
        let now = Utc::now();
        let jobs = match self
            .offloader
            .cold()
            .blocking(move |cold| cold.due_retry_jobs(now, fetch))
            .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!("RetryWorker: failed to load due jobs: {}", e);
                return 0;
            }
        };

        let mut started = 0;
        for job in jobs {
            if !self.in_flight.lock().insert(job.id) {
                continue;
            }
            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(p) => p,
                Err(_) => {
                    self.in_flight.lock().remove(&job.id);
                    break;
                }
            };

            let offloader = self.offloader.clone();
            let in_flight = self.in_flight.clone();
            let max_attempts = self.max_attempts;
            started += 1;

            tokio::spawn(async move {
                let _permit = permit;
                let job_id = job.id;
                if let Err(e) = run_job(&offloader, job, max_attempts).await {
                    tracing::error!("RetryWorker: job {} failed to update: {}", job_id, e);
                }
                in_flight.lock().remove(&job_id);
            });
        }
        started
    }
}

/// Run one attempt of a retry job. Payloads are re-read from the hot tier;
/// ids that have expired there are dropped.
pub async fn run_job(
    offloader: &MeasurementOffloader,
    job: RetryJob,
    max_attempts: u32,
) -> Result<RetryOutcome, StoreError> {
    let hot_keys: Vec<String> = job.measurement_ids.iter().map(|id| keys::results(id)).collect();
    let payloads = offloader.hot().get_many(&hot_keys).await?;

    let records: Vec<OffloadRecord> = job
        .measurement_ids
        .iter()
        .zip(payloads)
        .filter_map(|(id, payload)| {
            let parsed = parse_measurement_id(id)?;
            Some(OffloadRecord {
                id: id.clone(),
                created_at: parsed.created_at,
                payload: payload?,
            })
        })
        .collect();
    let dropped = job.measurement_ids.len() - records.len();

    if records.is_empty() {
        tracing::info!(
            "RetryWorker: job {} has no measurements left in the hot tier, dropping {} ids",
            job.id,
            dropped
        );
        delete_job(offloader, job.id).await?;
        return Ok(RetryOutcome::Completed { archived: 0, dropped });
    }

    match offloader.insert_batch_to_db(job.tier, records).await {
        Ok(archived) => {
            tracing::info!(
                "RetryWorker: job {} archived {} {} measurements ({} expired)",
                job.id,
                archived,
                job.tier.as_str(),
                dropped
            );
            delete_job(offloader, job.id).await?;
            Ok(RetryOutcome::Completed { archived, dropped })
        }
        Err(e) => {
            let attempts = job.attempts + 1;
            if attempts >= max_attempts {
                tracing::error!(
                    "RetryWorker: giving up on job {} after {} attempts, {} ids not archived: {}",
                    job.id,
                    attempts,
                    job.measurement_ids.len(),
                    e
                );
                delete_job(offloader, job.id).await?;
                return Ok(RetryOutcome::Abandoned);
            }

            tracing::warn!("RetryWorker: job {} attempt {} failed: {}", job.id, attempts, e);
            let next = next_attempt_at(Utc::now(), attempts);
            let (id, error) = (job.id, e.to_string());
            offloader
                .cold()
                .blocking(move |cold| cold.reschedule_retry_job(id, attempts, next, &error))
                .await?;
            Ok(RetryOutcome::Rescheduled { attempts })
        }
    }
}

async fn delete_job(offloader: &MeasurementOffloader, id: i64) -> Result<(), StoreError> {
    offloader.cold().blocking(move |cold| cold.delete_retry_job(id)).await
}
