//! Probe module: the connected measurement probes this service selects from.
//!
//! Probes are owned by the connection registry; this crate only reads them.

pub mod geo;
mod index;

pub use index::*;

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::router::LocationFilter;

/// Who attached a tag to the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    System,
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeTag {
    #[serde(rename = "type")]
    pub kind: TagKind,
    pub value: String,
}

impl ProbeTag {
    pub fn new(kind: TagKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Rebuild a tag from its public value. User tags carry a `u-` prefix.
    pub fn from_public_value(value: &str) -> Self {
        let kind = if value.starts_with("u-") {
            TagKind::User
        } else {
            TagKind::System
        };
        Self::new(kind, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeStatus {
    Ready,
    Offline,
}

/// Resolved physical location of a probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeLocation {
    pub continent: String,
    pub region: String,
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
    pub city: String,
    #[serde(default)]
    pub normalized_city: String,
    pub asn: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub network: String,
    #[serde(default)]
    pub normalized_network: String,
}

impl ProbeLocation {
    /// Fill the normalized fields when the upstream resolver left them empty.
    pub fn normalize(&mut self) {
        if self.normalized_city.is_empty() {
            self.normalized_city = normalize_public_name(&self.city);
        }
        if self.normalized_network.is_empty() {
            self.normalized_network = normalize_public_name(&self.network);
        }
    }
}

/// A connected (or, during replay, reconstructed offline) probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    /// Connection handle of the live session.
    pub client: String,
    pub version: String,
    pub ip: String,
    pub uuid: String,
    pub location: ProbeLocation,
    #[serde(default)]
    pub tags: Vec<ProbeTag>,
    #[serde(default)]
    pub resolvers: Vec<String>,
    #[serde(default)]
    pub index: ProbeIndex,
    pub status: ProbeStatus,
}

impl Probe {
    /// Normalize the location and (re)build the keyword index.
    pub fn prepare(&mut self) {
        self.location.normalize();
        self.index = build_probe_index(&self.location, &self.tags);
    }

    /// Tags visible to clients. Admin tags are internal.
    pub fn public_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter(|t| t.kind != TagKind::Admin)
            .map(|t| t.value.clone())
            .collect()
    }

    pub fn is_online(&self) -> bool {
        self.status == ProbeStatus::Ready
    }
}

/// Lowercase, and collapse anything that is not a letter or digit into a
/// single space.
pub fn normalize_public_name(name: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let re = SEPARATORS.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex"));
    re.replace_all(&name.to_lowercase(), " ").trim().to_string()
}

/// Source of currently connected, ready probes.
#[async_trait]
pub trait ProbeSource: Send + Sync {
    async fn fetch_connected_probes(&self) -> Vec<Probe>;
}

/// In-memory probe list. Replacing the list refreshes the dynamic keyword
/// sets of the shared [`LocationFilter`].
pub struct ProbeRegistry {
    probes: RwLock<Arc<Vec<Probe>>>,
    filter: Arc<LocationFilter>,
}

impl ProbeRegistry {
    pub fn new(filter: Arc<LocationFilter>) -> Self {
        Self {
            probes: RwLock::new(Arc::new(Vec::new())),
            filter,
        }
    }

    /// Replace the connected probe set.
    pub fn replace_probes(&self, mut probes: Vec<Probe>) {
        for probe in &mut probes {
            if probe.index.len() != IndexCategory::COUNT {
                probe.prepare();
            }
        }
        self.filter.refresh_dynamic_index(&probes);
        *self.probes.write() = Arc::new(probes);
    }

    pub fn len(&self) -> usize {
        self.probes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.read().is_empty()
    }
}

#[async_trait]
impl ProbeSource for ProbeRegistry {
    async fn fetch_connected_probes(&self) -> Vec<Probe> {
        let probes = self.probes.read().clone();
        probes.iter().filter(|p| p.is_online()).cloned().collect()
    }
}
