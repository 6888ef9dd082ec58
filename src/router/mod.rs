//! Turns a measurement request into a concrete, ordered probe set.

mod filter;
mod location;

pub use filter::*;
pub use location::*;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use crate::db::StoreError;
use crate::measurement::{
    parse_measurement_id, Locations, MeasurementRequest, MeasurementStore, ProbeSnapshot,
};
use crate::probe::{Probe, ProbeLocation, ProbeSource, ProbeStatus};

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Router output. `request` may differ from the input: replay copies the
/// original measurement's locations and limit forward.
#[derive(Debug, Clone)]
pub struct MatchedProbes {
    pub selected_probes: Vec<Probe>,
    pub request: MeasurementRequest,
}

pub struct ProbeRouter {
    filter: Arc<LocationFilter>,
    source: Arc<dyn ProbeSource>,
    store: Arc<MeasurementStore>,
}

impl ProbeRouter {
    pub fn new(filter: Arc<LocationFilter>, source: Arc<dyn ProbeSource>, store: Arc<MeasurementStore>) -> Self {
        Self { filter, source, store }
    }

    pub async fn find_matching_probes(&self, request: MeasurementRequest) -> Result<MatchedProbes, RouterError> {
        let probes = self.source.fetch_connected_probes().await;

        let locations = match &request.locations {
            Locations::Replay(id) => {
                let id = id.clone();
                return self.find_with_replay(&id, request, &probes).await;
            }
            Locations::List(locations) => locations,
        };

        let selected = self.select(&probes, locations, request.limit as usize, &mut rand::thread_rng());
        if selected.is_empty() {
            // An empty magic-only location may really be a measurement id.
            if let [only] = locations.as_slice() {
                if let Some(magic) = only.magic_only() {
                    let id = magic.to_string();
                    return self.find_with_replay(&id, request, &probes).await;
                }
            }
        }

        Ok(MatchedProbes {
            selected_probes: selected,
            request,
        })
    }

    /// Location-based selection: per-location limits, an even weight split
    /// across named locations, or the continent distribution.
    fn select<R: Rng + ?Sized>(
        &self,
        probes: &[Probe],
        locations: &[RequestLocation],
        limit: usize,
        rng: &mut R,
    ) -> Vec<Probe> {
        let refs: Vec<&Probe> = probes.iter().collect();

        let selected = if locations.iter().any(|l| l.limit.is_some()) {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut selected = Vec::new();
            for location in locations {
                let matched = self.filter.filter_by_location(&refs, location);
                let shuffled = self.filter.shuffle_for_location(matched, location, rng);
                let take = location.limit.unwrap_or(1) as usize;
                for probe in shuffled.into_iter().take(take) {
                    if seen.insert(probe.uuid.as_str()) {
                        selected.push(probe);
                    }
                }
            }
            selected
        } else if !locations.is_empty() {
            let weight = (100 / locations.len() as u32).max(1);
            let distribution: Vec<(RequestLocation, u32)> =
                locations.iter().map(|l| (l.clone(), weight)).collect();
            self.filter.filter_by_location_and_weight(&refs, &distribution, limit, rng)
        } else {
            self.filter.filter_globally_distributed(&refs, limit, rng)
        };

        selected.into_iter().cloned().collect()
    }

    /// Reuse the probes of a previous measurement, in their original order.
    /// Probes that are gone come back as offline placeholders built from the
    /// stored snapshot.
    async fn find_with_replay(
        &self,
        id: &str,
        mut request: MeasurementRequest,
        probes: &[Probe],
    ) -> Result<MatchedProbes, RouterError> {
        let no_match = |request| MatchedProbes {
            selected_probes: Vec::new(),
            request,
        };

        if parse_measurement_id(id).is_none() {
            return Ok(no_match(request));
        }

        let (ips, record) = tokio::join!(self.store.get_measurement_ips(id), self.store.get_measurement(id));
        let (Some(ips), Some(record)) = (ips?, record?) else {
            tracing::debug!("Router: replay of {} has no stored data", id);
            return Ok(no_match(request));
        };
        if ips.len() != record.results.len() {
            tracing::warn!(
                "Router: replay of {} has {} ips for {} results",
                id,
                ips.len(),
                record.results.len()
            );
            return Ok(no_match(request));
        }

        let by_ip: HashMap<&str, &Probe> = probes.iter().map(|p| (p.ip.as_str(), p)).collect();
        let selected_probes = ips
            .iter()
            .zip(&record.results)
            .map(|(ip, entry)| match by_ip.get(ip.as_str()) {
                Some(probe) => (*probe).clone(),
                None => offline_probe(ip, &entry.probe),
            })
            .collect();

        request.locations = Locations::List(record.locations);
        request.limit = record.limit;

        Ok(MatchedProbes {
            selected_probes,
            request,
        })
    }
}

/// Placeholder for a replayed probe that is no longer connected.
fn offline_probe(ip: &str, snapshot: &ProbeSnapshot) -> Probe {
    let mut location = ProbeLocation {
        continent: snapshot.continent.clone(),
        region: snapshot.region.clone(),
        country: snapshot.country.clone(),
        state: snapshot.state.clone(),
        city: snapshot.city.clone(),
        normalized_city: String::new(),
        asn: snapshot.asn,
        latitude: snapshot.latitude,
        longitude: snapshot.longitude,
        network: snapshot.network.clone(),
        normalized_network: String::new(),
    };
    location.normalize();

    Probe {
        client: String::new(),
        version: String::new(),
        ip: ip.to_string(),
        uuid: String::new(),
        location,
        tags: snapshot.tags(),
        resolvers: snapshot.resolvers.clone(),
        index: Vec::new(),
        status: ProbeStatus::Offline,
    }
}
