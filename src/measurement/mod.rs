//! Measurement records, their lifecycle, and the message plumbing that feeds
//! probe progress into them.

mod defaults;
mod dispatch;
mod id;
mod store;

pub use defaults::*;
pub use dispatch::*;
pub use id::*;
pub use store::*;

#[cfg(test)]
pub(crate) use store::tests as store_tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::probe::{Probe, ProbeTag};
use crate::router::RequestLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    Ping,
    Traceroute,
    Dns,
    Mtr,
    Http,
}

/// Either a list of location filters or, for replay, the id of a previous
/// measurement whose probes should be reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locations {
    Replay(String),
    List(Vec<RequestLocation>),
}

impl Default for Locations {
    fn default() -> Self {
        Locations::List(Vec::new())
    }
}

fn default_limit() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRequest {
    #[serde(rename = "type")]
    pub kind: MeasurementType,
    pub target: String,
    #[serde(default)]
    pub measurement_options: Map<String, Value>,
    #[serde(default)]
    pub locations: Locations,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub in_progress_updates: bool,
}

/// Caller identity resolved by the (external) auth layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub tier: Option<UserTier>,
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn tier(&self) -> UserTier {
        self.tier.unwrap_or(UserTier::Anonymous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasurementStatus {
    InProgress,
    Finished,
}

/// Status values of a single probe's result.
pub mod result_status {
    pub const IN_PROGRESS: &str = "in-progress";
    pub const FINISHED: &str = "finished";
    pub const FAILED: &str = "failed";
    pub const OFFLINE: &str = "offline";
}

pub const OFFLINE_PROBE_OUTPUT: &str =
    "This probe is currently offline. Please try again later.";
pub const TIMEOUT_OUTPUT_SUFFIX: &str = "\n\nThe measurement timed out.";

/// Probe details frozen at measurement creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSnapshot {
    pub continent: String,
    pub region: String,
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
    pub city: String,
    pub asn: u32,
    pub longitude: f64,
    pub latitude: f64,
    pub network: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub resolvers: Vec<String>,
}

impl From<&Probe> for ProbeSnapshot {
    fn from(probe: &Probe) -> Self {
        let loc = &probe.location;
        Self {
            continent: loc.continent.clone(),
            region: loc.region.clone(),
            country: loc.country.clone(),
            state: loc.state.clone(),
            city: loc.city.clone(),
            asn: loc.asn,
            longitude: loc.longitude,
            latitude: loc.latitude,
            network: loc.network.clone(),
            tags: probe.public_tags(),
            resolvers: probe.resolvers.clone(),
        }
    }
}

impl ProbeSnapshot {
    pub fn tags(&self) -> Vec<ProbeTag> {
        self.tags.iter().map(|t| ProbeTag::from_public_value(t)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResultEntry {
    pub probe: ProbeSnapshot,
    /// Type-specific output; always carries a `status`.
    pub result: Map<String, Value>,
}

impl MeasurementResultEntry {
    pub fn status(&self) -> Option<&str> {
        self.result.get("status").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MeasurementType,
    pub status: MeasurementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub target: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub probes_count: usize,
    #[serde(default)]
    pub locations: Vec<RequestLocation>,
    #[serde(default)]
    pub measurement_options: Map<String, Value>,
    #[serde(default)]
    pub in_progress_updates: bool,
    pub results: Vec<MeasurementResultEntry>,
}

/// Side data kept next to each record for exports and billing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMeta {
    pub tier: UserTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub probes_count: usize,
}

/// Streaming output from one probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementProgressMessage {
    pub measurement_id: String,
    pub test_id: String,
    /// Replace the fields instead of appending to them.
    #[serde(default)]
    pub overwrite: bool,
    pub result: Map<String, Value>,
}

/// Final output from one probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementResultMessage {
    pub measurement_id: String,
    pub test_id: String,
    pub result: Map<String, Value>,
}

/// Hot-tier key layout.
pub(crate) mod keys {
    use super::UserTier;

    pub const IN_PROGRESS: &str = "gp:in-progress";
    pub const TEST_TO_PROBE: &str = "gp:test-to-probe";

    pub fn results(id: &str) -> String {
        format!("gp:m:{{{id}}}:results")
    }

    pub fn ips(id: &str) -> String {
        format!("gp:m:{{{id}}}:ips")
    }

    pub fn meta(id: &str) -> String {
        format!("gp:m:{{{id}}}:meta")
    }

    pub fn awaiting(id: &str) -> String {
        format!("gp:m:{{{id}}}:probes_awaiting")
    }

    pub fn test_field(id: &str, test_index: usize) -> String {
        format!("{id}_{test_index}")
    }

    pub fn latest_offloaded(tier: UserTier) -> String {
        format!("gp:offload:latest:{}", tier.as_str())
    }
}
