//! Hot-path measurement lifecycle: create, update, complete, sweep, read.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value};

use super::{
    fill_defaults, generate_measurement_id, keys, merge_options, parse_measurement_id, record_defaults,
    result_status, strip_defaults, truncate_to_bucket, ExportMeta, Locations, MeasurementProgressMessage,
    MeasurementRecord, MeasurementRequest, MeasurementResultEntry, MeasurementResultMessage,
    MeasurementStatus, MeasurementType, ProbeSnapshot, RequestContext, OFFLINE_PROBE_OUTPUT,
    TIMEOUT_OUTPUT_SUFFIX,
};
use crate::config::Config;
use crate::db::{ColdStore, HotStore, OffloadRecord, StoreError};
use crate::probe::Probe;
use crate::scheduler::MeasurementOffloader;

pub struct MeasurementStore {
    hot: Arc<dyn HotStore>,
    cold: ColdStore,
    offloader: Arc<MeasurementOffloader>,
    timeout: Duration,
    result_ttl: Duration,
    test_map_ttl: Duration,
    cold_read_after: Duration,
    bucket: Duration,
    cleanup_page_size: usize,
}

fn parse_test_index(test_id: &str) -> Result<usize, StoreError> {
    test_id
        .parse()
        .map_err(|_| StoreError::InvalidTestId(test_id.to_string()))
}

/// Initial result shape for one probe.
fn initial_result(kind: MeasurementType, online: bool) -> Map<String, Value> {
    let value = if !online {
        json!({ "status": result_status::OFFLINE, "rawOutput": OFFLINE_PROBE_OUTPUT })
    } else if kind == MeasurementType::Http {
        json!({ "status": result_status::IN_PROGRESS, "rawHeaders": "", "rawBody": "", "rawOutput": "" })
    } else {
        json!({ "status": result_status::IN_PROGRESS, "rawOutput": "" })
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl MeasurementStore {
    pub fn new(
        hot: Arc<dyn HotStore>,
        cold: ColdStore,
        offloader: Arc<MeasurementOffloader>,
        config: &Config,
    ) -> Self {
        Self {
            hot,
            cold,
            offloader,
            timeout: config.measurement_timeout,
            result_ttl: config.result_ttl,
            test_map_ttl: config.test_map_ttl,
            cold_read_after: config.cold_read_after,
            bucket: config.offload_bucket,
            cleanup_page_size: config.cleanup_page_size.max(1),
        }
    }

    /// Create a record with one result slot per probe, in `probes` order.
    /// Probes that are not online get an `offline` result straight away.
    ///
    /// The per-measurement keys are written concurrently and without a
    /// transaction. Only a failed results document or counter write is an
    /// error; the rest are logged.
    pub async fn create_measurement(
        &self,
        request: &MeasurementRequest,
        probes: &[Probe],
        ctx: &RequestContext,
    ) -> Result<String, StoreError> {
        let now = Utc::now();
        let tier = ctx.tier();
        let id = generate_measurement_id(now, tier);

        let results: Vec<MeasurementResultEntry> = probes
            .iter()
            .map(|probe| MeasurementResultEntry {
                probe: ProbeSnapshot::from(probe),
                result: initial_result(request.kind, probe.is_online()),
            })
            .collect();
        let awaiting = probes.iter().filter(|p| p.is_online()).count();

        let locations = match &request.locations {
            Locations::List(list) => list.clone(),
            Locations::Replay(_) => Vec::new(),
        };
        let record = MeasurementRecord {
            id: id.clone(),
            kind: request.kind,
            status: if awaiting == 0 {
                MeasurementStatus::Finished
            } else {
                MeasurementStatus::InProgress
            },
            created_at: now,
            updated_at: now,
            target: request.target.clone(),
            limit: request.limit,
            probes_count: probes.len(),
            locations,
            measurement_options: merge_options(request.kind, &request.measurement_options),
            in_progress_updates: request.in_progress_updates,
            results,
        };

        let mut doc = serde_json::to_value(&record)?;
        strip_defaults(&mut doc, &record_defaults(request.kind));
        let payload = serde_json::to_string(&doc)?;

        let ips: Vec<&str> = probes.iter().map(|p| p.ip.as_str()).collect();
        let ips = serde_json::to_string(&ips)?;
        let meta = serde_json::to_string(&ExportMeta {
            tier,
            user_id: ctx.user_id.clone(),
            created_at: now,
            probes_count: probes.len(),
        })?;

        let test_fields: Vec<(String, String)> = probes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_online())
            .map(|(i, p)| (keys::test_field(&id, i), p.uuid.clone()))
            .collect();
        let registry = vec![(id.clone(), now.timestamp_millis().to_string())];
        let ttl = Some(self.result_ttl);
        let results_key = keys::results(&id);
        let ips_key = keys::ips(&id);
        let meta_key = keys::meta(&id);

        let (results_res, awaiting_res, ips_res, meta_res, registry_res, tests_res) = tokio::join!(
            self.hot.set(&results_key, payload.clone(), ttl),
            async {
                if awaiting == 0 {
                    return Ok(());
                }
                self.hot.set(&keys::awaiting(&id), awaiting.to_string(), ttl).await
            },
            self.hot.set(&ips_key, ips, ttl),
            self.hot.set(&meta_key, meta, ttl),
            async {
                if awaiting == 0 {
                    return Ok(());
                }
                self.hot.hash_set(keys::IN_PROGRESS, &registry, None).await
            },
            async {
                if test_fields.is_empty() {
                    return Ok(());
                }
                self.hot
                    .hash_set(keys::TEST_TO_PROBE, &test_fields, Some(self.test_map_ttl))
                    .await
            },
        );

        results_res?;
        awaiting_res?;
        for (what, res) in [("ips", ips_res), ("meta", meta_res), ("registry", registry_res), ("test map", tests_res)] {
            if let Err(e) = res {
                tracing::warn!("Measurement {}: failed to write {}: {}", id, what, e);
            }
        }

        if awaiting == 0 {
            tracing::debug!("Measurement {} has no online probes, finishing immediately", id);
            self.offloader
                .enqueue_for_offload(OffloadRecord {
                    id: id.clone(),
                    created_at: now,
                    payload,
                })
                .await;
        }

        Ok(id)
    }

    /// Append (or, with `overwrite`, replace) streaming output of one probe.
    pub async fn store_measurement_progress(&self, msg: &MeasurementProgressMessage) -> Result<(), StoreError> {
        let index = parse_test_index(&msg.test_id)?;
        self.hot
            .record_progress(
                &keys::results(&msg.measurement_id),
                index,
                &msg.result,
                msg.overwrite,
                Utc::now(),
            )
            .await?;
        Ok(())
    }

    /// Store one probe's final result. Returns the finished record when this
    /// was the last outstanding result.
    pub async fn store_measurement_result(
        &self,
        msg: &MeasurementResultMessage,
    ) -> Result<Option<MeasurementRecord>, StoreError> {
        let id = &msg.measurement_id;
        let index = parse_test_index(&msg.test_id)?;

        let finished = self
            .hot
            .record_result(&keys::results(id), &keys::awaiting(id), index, &msg.result, Utc::now())
            .await?;
        let Some(raw) = finished else {
            return Ok(None);
        };

        // Whoever removes the registry entry finalizes.
        if self.hot.hash_remove(keys::IN_PROGRESS, &[id.clone()]).await? == 0 {
            return Ok(None);
        }

        let record = self.finalize(id, raw).await?;
        Ok(Some(record))
    }

    /// Drop ancillary keys and hand the record to the offloader. The caller
    /// must already own the registry removal.
    async fn finalize(&self, id: &str, raw: String) -> Result<MeasurementRecord, StoreError> {
        let record = decode_record(&raw)?;

        let test_fields: Vec<String> = (0..record.probes_count).map(|i| keys::test_field(id, i)).collect();
        let awaiting_keys = [keys::awaiting(id)];
        let (awaiting_res, tests_res) = tokio::join!(
            self.hot.delete(&awaiting_keys),
            self.hot.hash_remove(keys::TEST_TO_PROBE, &test_fields),
        );
        if let Err(e) = awaiting_res.and(tests_res) {
            tracing::warn!("Measurement {}: failed to remove ancillary keys: {}", id, e);
        }

        let created_at = parse_measurement_id(id).map_or(record.created_at, |p| p.created_at);
        self.offloader
            .enqueue_for_offload(OffloadRecord {
                id: id.to_string(),
                created_at,
                payload: raw,
            })
            .await;

        Ok(record)
    }

    /// Full record with request defaults filled back in.
    pub async fn get_measurement(&self, id: &str) -> Result<Option<MeasurementRecord>, StoreError> {
        match self.get_measurement_string(id).await? {
            Some(raw) => Ok(Some(decode_record(&raw)?)),
            None => Ok(None),
        }
    }

    /// Compact stored JSON. Older records try the cold tier first; any cold
    /// miss or error falls back to the hot tier.
    pub async fn get_measurement_string(&self, id: &str) -> Result<Option<String>, StoreError> {
        let Some(parsed) = parse_measurement_id(id) else {
            return Ok(None);
        };

        let age = (Utc::now() - parsed.created_at).to_std().unwrap_or_default();
        if age > self.cold_read_after {
            let cold = self.cold.clone();
            let bucket = truncate_to_bucket(parsed.created_at, self.bucket);
            let key = id.to_string();
            let res = tokio::task::spawn_blocking(move || cold.get_measurement_string(&key, parsed.tier, bucket)).await;
            match res {
                Ok(Ok(Some(raw))) => return Ok(Some(raw)),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => tracing::warn!("Measurement {}: cold read failed: {}", id, e),
                Err(e) => tracing::warn!("Measurement {}: cold read task failed: {}", id, e),
            }
        }

        self.hot.get(&keys::results(id)).await
    }

    /// Probe IPs in result order.
    pub async fn get_measurement_ips(&self, id: &str) -> Result<Option<Vec<String>>, StoreError> {
        match self.hot.get(&keys::ips(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// UUID of the probe assigned to a test, while the correlation entry lives.
    pub async fn get_test_probe(&self, measurement_id: &str, test_id: &str) -> Result<Option<String>, StoreError> {
        let index = parse_test_index(test_id)?;
        self.hot
            .hash_get(keys::TEST_TO_PROBE, &keys::test_field(measurement_id, index))
            .await
    }

    /// Force-fail the pending results of each measurement. Ids already gone
    /// from the registry are skipped. Returns how many were finished.
    pub async fn mark_finished_by_timeout(&self, ids: &[String]) -> usize {
        let mut finished = 0;
        for id in ids {
            match self.finish_by_timeout(id).await {
                Ok(true) => finished += 1,
                Ok(false) => {}
                Err(e) => tracing::error!("Measurement {}: timeout sweep failed: {}", id, e),
            }
        }
        finished
    }

    async fn finish_by_timeout(&self, id: &str) -> Result<bool, StoreError> {
        if self.hot.hash_remove(keys::IN_PROGRESS, &[id.to_string()]).await? == 0 {
            return Ok(false);
        }

        let failed = self
            .hot
            .fail_pending_results(&keys::results(id), TIMEOUT_OUTPUT_SUFFIX, Utc::now())
            .await?;
        let Some(raw) = failed else {
            // Results already expired; only the counter is left behind.
            self.hot.delete(&[keys::awaiting(id)]).await?;
            return Ok(false);
        };

        self.finalize(id, raw).await?;
        Ok(true)
    }

    /// One sweep over the in-progress registry. Returns how many measurements
    /// timed out.
    pub async fn cleanup(&self) -> Result<usize, StoreError> {
        let total = self.hot.hash_len(keys::IN_PROGRESS).await?;
        if total > self.cleanup_page_size {
            tracing::warn!(
                "Cleanup: {} measurements in progress, only {} checked per pass",
                total,
                self.cleanup_page_size
            );
        }

        let cutoff = Utc::now().timestamp_millis() - self.timeout.as_millis() as i64;
        let expired: Vec<String> = self
            .hot
            .hash_scan(keys::IN_PROGRESS, self.cleanup_page_size)
            .await?
            .into_iter()
            .filter(|(_, created)| created.parse::<i64>().map_or(true, |ms| ms < cutoff))
            .map(|(id, _)| id)
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        let finished = self.mark_finished_by_timeout(&expired).await;
        tracing::info!("Cleanup: {} measurements timed out", finished);
        Ok(finished)
    }
}

/// Parse a stored payload, putting stripped defaults back.
fn decode_record(raw: &str) -> Result<MeasurementRecord, StoreError> {
    let mut doc: Value = serde_json::from_str(raw)?;
    let kind: MeasurementType = serde_json::from_value(doc.get("type").cloned().unwrap_or(Value::Null))?;
    fill_defaults(&mut doc, &record_defaults(kind));
    Ok(serde_json::from_value(doc)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::TierTables;
    use crate::db::MemoryHotStore;
    use crate::measurement::UserTier;
    use crate::probe::tests::probe;
    use crate::probe::ProbeStatus;
    use tempfile::TempDir;

    pub(crate) struct Harness {
        pub _dir: TempDir,
        pub hot: Arc<MemoryHotStore>,
        pub cold: ColdStore,
        pub store: Arc<MeasurementStore>,
    }

    pub(crate) fn harness_with(config: Config) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let cold = ColdStore::new(dir.path().join("cold.db"), TierTables::default()).unwrap();
        let hot = Arc::new(MemoryHotStore::new());
        let offloader = Arc::new(MeasurementOffloader::new(hot.clone(), cold.clone(), &config));
        let store = Arc::new(MeasurementStore::new(hot.clone(), cold.clone(), offloader, &config));
        Harness {
            _dir: dir,
            hot,
            cold,
            store,
        }
    }

    pub(crate) fn harness() -> Harness {
        harness_with(Config {
            offload_batch_size: 1,
            ..Config::default()
        })
    }

    pub(crate) fn ping_request() -> MeasurementRequest {
        serde_json::from_value(json!({ "type": "ping", "target": "example.com", "limit": 3 })).unwrap()
    }

    fn result_msg(id: &str, test: usize, output: &str) -> MeasurementResultMessage {
        MeasurementResultMessage {
            measurement_id: id.to_string(),
            test_id: test.to_string(),
            result: json!({ "status": "finished", "rawOutput": output })
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    fn three_probes() -> Vec<Probe> {
        vec![
            probe(1, "EU", "PL", "Warsaw", 100),
            probe(2, "NA", "US", "Dallas", 200),
            probe(3, "EU", "DE", "Berlin", 300),
        ]
    }

    #[tokio::test]
    async fn test_create_round_trips_order() {
        let h = harness();
        let probes = three_probes();
        let id = h
            .store
            .create_measurement(&ping_request(), &probes, &RequestContext::default())
            .await
            .unwrap();

        let record = h.store.get_measurement(&id).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.status, MeasurementStatus::InProgress);
        assert_eq!(record.probes_count, 3);
        assert_eq!(record.results.len(), 3);
        let countries: Vec<&str> = record.results.iter().map(|r| r.probe.country.as_str()).collect();
        assert_eq!(countries, vec!["PL", "US", "DE"]);
        assert_eq!(record.results[0].status(), Some("in-progress"));
        assert_eq!(record.measurement_options["packets"], 3);

        let ips = h.store.get_measurement_ips(&id).await.unwrap().unwrap();
        assert_eq!(ips, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert_eq!(h.store.get_test_probe(&id, "1").await.unwrap().as_deref(), Some("uuid-2"));
        assert_eq!(parse_measurement_id(&id).unwrap().tier, UserTier::Anonymous);
    }

    #[tokio::test]
    async fn test_stored_payload_omits_defaults() {
        let h = harness();
        let id = h
            .store
            .create_measurement(&ping_request(), &three_probes(), &RequestContext::default())
            .await
            .unwrap();

        let raw = h.store.get_measurement_string(&id).await.unwrap().unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert!(doc.get("measurementOptions").is_none());
        assert!(doc.get("inProgressUpdates").is_none());
        assert_eq!(doc["limit"], 3);
    }

    #[tokio::test]
    async fn test_offline_probes_and_http_shape() {
        let h = harness();
        let mut probes = three_probes();
        probes[2].status = ProbeStatus::Offline;
        let request: MeasurementRequest =
            serde_json::from_value(json!({ "type": "http", "target": "example.com" })).unwrap();

        let id = h
            .store
            .create_measurement(&request, &probes, &RequestContext::default())
            .await
            .unwrap();
        let record = h.store.get_measurement(&id).await.unwrap().unwrap();
        assert_eq!(record.results[0].result["rawHeaders"], "");
        assert_eq!(record.results[2].status(), Some("offline"));
        assert_eq!(record.results[2].result["rawOutput"], OFFLINE_PROBE_OUTPUT);
        assert!(h.store.get_test_probe(&id, "2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_offline_finishes_immediately() {
        let h = harness();
        let mut probes = three_probes();
        for p in &mut probes {
            p.status = ProbeStatus::Offline;
        }
        let id = h
            .store
            .create_measurement(&ping_request(), &probes, &RequestContext::default())
            .await
            .unwrap();

        let record = h.store.get_measurement(&id).await.unwrap().unwrap();
        assert_eq!(record.status, MeasurementStatus::Finished);
        assert_eq!(h.hot.hash_len(keys::IN_PROGRESS).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_last_result_finishes_measurement() {
        let h = harness();
        let probes = three_probes();
        let id = h
            .store
            .create_measurement(&ping_request(), &probes, &RequestContext::default())
            .await
            .unwrap();

        assert!(h.store.store_measurement_result(&result_msg(&id, 2, "c")).await.unwrap().is_none());
        assert!(h.store.store_measurement_result(&result_msg(&id, 0, "a")).await.unwrap().is_none());
        let done = h.store.store_measurement_result(&result_msg(&id, 1, "b")).await.unwrap().unwrap();

        assert_eq!(done.status, MeasurementStatus::Finished);
        assert_eq!(done.results[1].result["rawOutput"], "b");
        assert_eq!(h.hot.hash_len(keys::IN_PROGRESS).await.unwrap(), 0);
        assert!(h.store.get_test_probe(&id, "0").await.unwrap().is_none());
        assert!(h.hot.get(&keys::awaiting(&id)).await.unwrap().is_none());

        // A late duplicate is ignored.
        assert!(h.store.store_measurement_result(&result_msg(&id, 1, "b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_appends_output() {
        let h = harness();
        let id = h
            .store
            .create_measurement(&ping_request(), &three_probes(), &RequestContext::default())
            .await
            .unwrap();

        for chunk in ["PING ", "example.com"] {
            let msg = MeasurementProgressMessage {
                measurement_id: id.clone(),
                test_id: "0".to_string(),
                overwrite: false,
                result: json!({ "rawOutput": chunk }).as_object().cloned().unwrap(),
            };
            h.store.store_measurement_progress(&msg).await.unwrap();
        }

        let record = h.store.get_measurement(&id).await.unwrap().unwrap();
        assert_eq!(record.results[0].result["rawOutput"], "PING example.com");
        assert_eq!(record.status, MeasurementStatus::InProgress);

        let bad = MeasurementProgressMessage {
            measurement_id: id,
            test_id: "x".to_string(),
            overwrite: false,
            result: Map::new(),
        };
        assert!(matches!(
            h.store.store_measurement_progress(&bad).await,
            Err(StoreError::InvalidTestId(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_idempotent() {
        let h = harness();
        let id = h
            .store
            .create_measurement(&ping_request(), &three_probes(), &RequestContext::default())
            .await
            .unwrap();
        h.store.store_measurement_result(&result_msg(&id, 0, "ok")).await.unwrap();

        assert_eq!(h.store.mark_finished_by_timeout(&[id.clone()]).await, 1);
        assert_eq!(h.store.mark_finished_by_timeout(&[id.clone()]).await, 0);

        let record = h.store.get_measurement(&id).await.unwrap().unwrap();
        assert_eq!(record.status, MeasurementStatus::Finished);
        assert_eq!(record.results[0].status(), Some("finished"));
        assert_eq!(record.results[1].status(), Some("failed"));
        assert_eq!(record.results[1].result["rawOutput"], TIMEOUT_OUTPUT_SUFFIX);

        // Completion after the sweep no longer finalizes.
        assert!(h.store.store_measurement_result(&result_msg(&id, 2, "late")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_skips_completed_measurement() {
        let h = harness();
        let probes = three_probes();
        let probes = &probes[..2];
        let id = h
            .store
            .create_measurement(&ping_request(), probes, &RequestContext::default())
            .await
            .unwrap();
        h.store.store_measurement_result(&result_msg(&id, 0, "a")).await.unwrap();
        let done = h.store.store_measurement_result(&result_msg(&id, 1, "b")).await.unwrap();
        assert!(done.is_some());

        assert_eq!(h.store.mark_finished_by_timeout(&[id.clone()]).await, 0);

        let record = h.store.get_measurement(&id).await.unwrap().unwrap();
        let statuses: Vec<_> = record.results.iter().map(|r| r.status()).collect();
        assert_eq!(statuses, vec![Some("finished"), Some("finished")]);
        assert_eq!(record.results[1].result["rawOutput"], "b");
    }

    #[tokio::test]
    async fn test_sweep_racing_completion_finalizes_once() {
        let h = harness();
        let probes = three_probes();
        let probes = &probes[..2];
        let id = h
            .store
            .create_measurement(&ping_request(), probes, &RequestContext::default())
            .await
            .unwrap();
        h.store.store_measurement_result(&result_msg(&id, 1, "b")).await.unwrap();

        // Last result lands in the hot store, but the sweep reaches the
        // registry before the completing caller does.
        let last = result_msg(&id, 0, "ok");
        let completed = h
            .hot
            .record_result(&keys::results(&id), &keys::awaiting(&id), 0, &last.result, Utc::now())
            .await
            .unwrap();
        assert!(completed.is_some());

        assert_eq!(h.store.mark_finished_by_timeout(&[id.clone()]).await, 1);
        assert_eq!(h.hot.hash_len(keys::IN_PROGRESS).await.unwrap(), 0);

        let record = h.store.get_measurement(&id).await.unwrap().unwrap();
        assert_eq!(record.status, MeasurementStatus::Finished);
        assert_eq!(record.results[0].status(), Some("finished"));
        assert_eq!(record.results[0].result["rawOutput"], "ok");

        // The completing path lost the registry removal and does not finalize again.
        assert!(h.store.store_measurement_result(&last).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_isolates_failures() {
        let h = harness();
        let id = h
            .store
            .create_measurement(&ping_request(), &three_probes(), &RequestContext::default())
            .await
            .unwrap();
        let broken = generate_measurement_id(Utc::now(), UserTier::Member);
        h.hot
            .hash_set(keys::IN_PROGRESS, &[(broken.clone(), "0".to_string())], None)
            .await
            .unwrap();
        h.hot.set(&keys::results(&broken), "not json".to_string(), None).await.unwrap();

        let swept = h.store.mark_finished_by_timeout(&[broken, id.clone()]).await;
        assert_eq!(swept, 1);
        let record = h.store.get_measurement(&id).await.unwrap().unwrap();
        assert_eq!(record.status, MeasurementStatus::Finished);
    }

    #[tokio::test]
    async fn test_cleanup_only_sweeps_expired() {
        let h = harness_with(Config {
            measurement_timeout: Duration::from_secs(30),
            ..Config::default()
        });
        let fresh = h
            .store
            .create_measurement(&ping_request(), &three_probes(), &RequestContext::default())
            .await
            .unwrap();
        let stale = h
            .store
            .create_measurement(&ping_request(), &three_probes(), &RequestContext::default())
            .await
            .unwrap();
        let old_ms = (Utc::now().timestamp_millis() - 60_000).to_string();
        h.hot
            .hash_set(keys::IN_PROGRESS, &[(stale.clone(), old_ms)], None)
            .await
            .unwrap();

        assert_eq!(h.store.cleanup().await.unwrap(), 1);
        assert_eq!(
            h.store.get_measurement(&stale).await.unwrap().unwrap().status,
            MeasurementStatus::Finished
        );
        assert_eq!(
            h.store.get_measurement(&fresh).await.unwrap().unwrap().status,
            MeasurementStatus::InProgress
        );
    }

    #[tokio::test]
    async fn test_old_ids_read_cold_then_fall_back_to_hot() {
        let h = harness();
        let created_at = Utc::now() - chrono::Duration::hours(2);
        let id = generate_measurement_id(created_at, UserTier::Member);

        // Only in the hot tier: cold miss falls back.
        h.hot.set(&keys::results(&id), r#"{"tier":"hot"}"#.to_string(), None).await.unwrap();
        assert_eq!(
            h.store.get_measurement_string(&id).await.unwrap().as_deref(),
            Some(r#"{"tier":"hot"}"#)
        );

        // Cold copy wins once archived.
        h.store
            .offloader
            .insert_batch_to_db(
                UserTier::Member,
                vec![OffloadRecord {
                    id: id.clone(),
                    created_at,
                    payload: r#"{"tier":"cold"}"#.to_string(),
                }],
            )
            .await
            .unwrap();
        assert_eq!(
            h.store.get_measurement_string(&id).await.unwrap().as_deref(),
            Some(r#"{"tier":"cold"}"#)
        );

        // A broken cold tier never hides the hot copy.
        h.cold.drop_table(UserTier::Member).unwrap();
        assert_eq!(
            h.store.get_measurement_string(&id).await.unwrap().as_deref(),
            Some(r#"{"tier":"hot"}"#)
        );

        assert!(h.store.get_measurement_string("bogus").await.unwrap().is_none());
    }
}
