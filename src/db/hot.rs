//! Hot tier: an expiring key-value store.
//!
//! Besides plain strings and hashes, the store exposes three atomic
//! primitives over stored measurement documents. They are where the
//! "was this the last outstanding result?" decision is made, so concurrent
//! writers never need application-level counting.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::StoreError;
use crate::measurement::result_status;

#[async_trait]
pub trait HotStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError>;

    /// Reset the TTL of an existing key. `false` if the key is gone.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Set hash fields; `ttl` applies to each written field.
    async fn hash_set(
        &self,
        key: &str,
        entries: &[(String, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Remove hash fields, returning how many existed.
    async fn hash_remove(&self, key: &str, fields: &[String]) -> Result<usize, StoreError>;

    /// Up to `count` live fields of a hash, in no particular order.
    async fn hash_scan(&self, key: &str, count: usize) -> Result<Vec<(String, String)>, StoreError>;

    async fn hash_len(&self, key: &str) -> Result<usize, StoreError>;

    /// Atomically raise an integer key to `value` if it is lower; returns the
    /// stored value.
    async fn set_max(&self, key: &str, value: i64) -> Result<i64, StoreError>;

    /// Merge streaming output into `results[test_index].result` of the
    /// document at `key`. Ignored once that entry is no longer in progress.
    /// Returns whether anything was written.
    async fn record_progress(
        &self,
        key: &str,
        test_index: usize,
        fields: &Map<String, Value>,
        overwrite: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Store a final result and decrement the awaiting counter. When this was
    /// the last outstanding result, the document is marked finished and
    /// returned.
    async fn record_result(
        &self,
        key: &str,
        awaiting_key: &str,
        test_index: usize,
        result: &Map<String, Value>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError>;

    /// Force every in-progress result to failed, appending `suffix` to its
    /// output, and mark the document finished. `None` if the document is gone.
    async fn fail_pending_results(
        &self,
        key: &str,
        suffix: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError>;
}

// --- Document primitives shared by every backend ---

fn result_slot<'a>(doc: &'a mut Value, test_index: usize) -> Result<&'a mut Map<String, Value>, StoreError> {
    doc.get_mut("results")
        .and_then(|results| results.get_mut(test_index))
        .and_then(|entry| entry.get_mut("result"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| StoreError::InvalidTestId(test_index.to_string()))
}

fn is_in_progress(result: &Map<String, Value>) -> bool {
    result.get("status").and_then(Value::as_str) == Some(result_status::IN_PROGRESS)
}

fn set_updated_at(doc: &mut Value, updated_at: DateTime<Utc>) -> Result<(), StoreError> {
    if let Some(fields) = doc.as_object_mut() {
        fields.insert("updatedAt".to_string(), serde_json::to_value(updated_at)?);
    }
    Ok(())
}

fn mark_finished(doc: &mut Value) {
    if let Some(fields) = doc.as_object_mut() {
        fields.insert("status".to_string(), Value::from("finished"));
    }
}

/// Append (or replace) streaming fields on an in-progress result.
pub fn apply_progress(
    doc: &mut Value,
    test_index: usize,
    fields: &Map<String, Value>,
    overwrite: bool,
) -> Result<bool, StoreError> {
    let slot = result_slot(doc, test_index)?;
    if !is_in_progress(slot) {
        return Ok(false);
    }

    for (name, value) in fields {
        if name == "status" {
            continue;
        }
        if !overwrite {
            if let (Some(Value::String(existing)), Value::String(more)) = (slot.get_mut(name), value) {
                existing.push_str(more);
                continue;
            }
        }
        slot.insert(name.clone(), value.clone());
    }
    Ok(true)
}

/// Replace an in-progress result with its final value. `false` when the
/// entry was already final (duplicate delivery).
pub fn apply_result(doc: &mut Value, test_index: usize, result: &Map<String, Value>) -> Result<bool, StoreError> {
    let slot = result_slot(doc, test_index)?;
    if !is_in_progress(slot) {
        return Ok(false);
    }

    let mut final_result = result.clone();
    let status = final_result.get("status").and_then(Value::as_str);
    if status.is_none() || status == Some(result_status::IN_PROGRESS) {
        final_result.insert("status".to_string(), Value::from(result_status::FINISHED));
    }
    *slot = final_result;
    Ok(true)
}

/// Fail every in-progress entry. Returns how many were changed.
pub fn apply_timeout(doc: &mut Value, suffix: &str) -> usize {
    let Some(results) = doc.get_mut("results").and_then(Value::as_array_mut) else {
        return 0;
    };

    let mut failed = 0;
    for result in results
        .iter_mut()
        .filter_map(|entry| entry.get_mut("result").and_then(Value::as_object_mut))
        .filter(|result| is_in_progress(result))
    {
        result.insert("status".to_string(), Value::from(result_status::FAILED));
        let output = result
            .get("rawOutput")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let output = format!("{output}{suffix}");
        result.insert("rawOutput".to_string(), Value::from(output));
        failed += 1;
    }
    failed
}

/// Number of results still in progress.
pub fn count_in_progress(doc: &Value) -> usize {
    doc.get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|entry| entry.get("result").and_then(Value::as_object))
                .filter(|result| is_in_progress(result))
                .count()
        })
        .unwrap_or(0)
}

// --- In-memory implementation ---

enum Slot {
    Str(String),
    Hash(HashMap<String, (String, Option<Instant>)>),
}

struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

fn field_live(expires_at: &Option<Instant>, now: Instant) -> bool {
    expires_at.map_or(true, |at| at > now)
}

/// Process-local hot store. One mutex guards all keys, which makes every
/// method atomic with respect to the others.
#[derive(Default)]
pub struct MemoryHotStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryHotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired keys and hash fields. Reads already ignore them; this
    /// only reclaims memory.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        for entry in entries.values_mut() {
            if let Slot::Hash(fields) = &mut entry.slot {
                fields.retain(|_, (_, expires_at)| field_live(expires_at, now));
            }
        }
        before - entries.len()
    }

    fn read_string(entries: &HashMap<String, Entry>, key: &str, now: Instant) -> Option<String> {
        match entries.get(key) {
            Some(Entry { slot: Slot::Str(value), expires_at }) if field_live(expires_at, now) => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    /// Rewrite a string value while keeping its TTL.
    fn write_string(entries: &mut HashMap<String, Entry>, key: &str, value: String) {
        if let Some(entry) = entries.get_mut(key) {
            entry.slot = Slot::Str(value);
        }
    }

    fn live_hash<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut HashMap<String, (String, Option<Instant>)>> {
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => match &mut entry.slot {
                Slot::Hash(fields) => Some(fields),
                Slot::Str(_) => None,
            },
            _ => None,
        }
    }
}

#[async_trait]
impl HotStore for MemoryHotStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock();
        Ok(Self::read_string(&entries, key, Instant::now()))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(keys.iter().map(|key| Self::read_string(&entries, key, now)).collect())
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                slot: Slot::Str(value),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|entry| entry.is_live(now))
            .count())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn hash_set(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let expires_at = ttl.map(|ttl| now + ttl);
        let mut entries = self.entries.lock();

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            slot: Slot::Hash(HashMap::new()),
            expires_at: None,
        });
        if !entry.is_live(now) || matches!(entry.slot, Slot::Str(_)) {
            *entry = Entry {
                slot: Slot::Hash(HashMap::new()),
                expires_at: None,
            };
        }
        if let Slot::Hash(hash) = &mut entry.slot {
            for (field, value) in fields {
                hash.insert(field.clone(), (value.clone(), expires_at));
            }
        }
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(Self::live_hash(&mut entries, key, now)
            .and_then(|hash| hash.get(field))
            .filter(|(_, expires_at)| field_live(expires_at, now))
            .map(|(value, _)| value.clone()))
    }

    async fn hash_remove(&self, key: &str, fields: &[String]) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let Some(hash) = Self::live_hash(&mut entries, key, now) else {
            return Ok(0);
        };
        Ok(fields
            .iter()
            .filter_map(|field| hash.remove(field))
            .filter(|(_, expires_at)| field_live(expires_at, now))
            .count())
    }

    async fn hash_scan(&self, key: &str, count: usize) -> Result<Vec<(String, String)>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(Self::live_hash(&mut entries, key, now)
            .map(|hash| {
                hash.iter()
                    .filter(|(_, (_, expires_at))| field_live(expires_at, now))
                    .take(count)
                    .map(|(field, (value, _))| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn hash_len(&self, key: &str) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(Self::live_hash(&mut entries, key, now)
            .map(|hash| hash.values().filter(|(_, at)| field_live(at, now)).count())
            .unwrap_or(0))
    }

    async fn set_max(&self, key: &str, value: i64) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let current = Self::read_string(&entries, key, now).and_then(|v| v.parse::<i64>().ok());
        let stored = current.map_or(value, |current| current.max(value));
        entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Str(stored.to_string()),
                expires_at: None,
            },
        );
        Ok(stored)
    }

    async fn record_progress(
        &self,
        key: &str,
        test_index: usize,
        fields: &Map<String, Value>,
        overwrite: bool,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let Some(raw) = Self::read_string(&entries, key, now) else {
            return Ok(false);
        };

        let mut doc: Value = serde_json::from_str(&raw)?;
        if !apply_progress(&mut doc, test_index, fields, overwrite)? {
            return Ok(false);
        }
        set_updated_at(&mut doc, updated_at)?;
        Self::write_string(&mut entries, key, serde_json::to_string(&doc)?);
        Ok(true)
    }

    async fn record_result(
        &self,
        key: &str,
        awaiting_key: &str,
        test_index: usize,
        result: &Map<String, Value>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let Some(raw) = Self::read_string(&entries, key, now) else {
            return Ok(None);
        };

        let mut doc: Value = serde_json::from_str(&raw)?;
        if !apply_result(&mut doc, test_index, result)? {
            return Ok(None);
        }
        set_updated_at(&mut doc, updated_at)?;

        let counter = Self::read_string(&entries, awaiting_key, now).and_then(|v| v.parse::<i64>().ok());
        let remaining = match counter {
            Some(count) => {
                let count = count - 1;
                Self::write_string(&mut entries, awaiting_key, count.to_string());
                count
            }
            // Counter write lost at creation: fall back to scanning.
            None => count_in_progress(&doc) as i64,
        };

        let finished = remaining <= 0;
        if finished {
            mark_finished(&mut doc);
        }
        let serialized = serde_json::to_string(&doc)?;
        Self::write_string(&mut entries, key, serialized.clone());

        Ok(finished.then_some(serialized))
    }

    async fn fail_pending_results(
        &self,
        key: &str,
        suffix: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let Some(raw) = Self::read_string(&entries, key, now) else {
            return Ok(None);
        };

        let mut doc: Value = serde_json::from_str(&raw)?;
        apply_timeout(&mut doc, suffix);
        mark_finished(&mut doc);
        set_updated_at(&mut doc, updated_at)?;
        let serialized = serde_json::to_string(&doc)?;
        Self::write_string(&mut entries, key, serialized.clone());
        Ok(Some(serialized))
    }
}
