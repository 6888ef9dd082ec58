//! Database model types.

use chrono::{DateTime, Utc};

use crate::measurement::UserTier;

/// A finished record queued for archival.
#[derive(Debug, Clone)]
pub struct OffloadRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Compact stored JSON of the record.
    pub payload: String,
}

/// A compressed cold-tier row.
#[derive(Debug, Clone)]
pub struct OffloadRow {
    pub id: String,
    /// Creation time truncated to the offload bucket.
    pub created_at: DateTime<Utc>,
    pub data: Vec<u8>,
}

/// A failed offload batch waiting to be retried. Only ids are kept; the
/// payloads are re-read from the hot tier at retry time.
#[derive(Debug, Clone)]
pub struct RetryJob {
    pub id: i64,
    pub tier: UserTier,
    pub measurement_ids: Vec<String>,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
}
