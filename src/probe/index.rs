//! Per-probe keyword index.
//!
//! Each probe carries one slot per [`IndexCategory`]. The slot position is a
//! global priority: when a keyword matches several categories, the lowest
//! position wins.

use super::geo;
use super::{ProbeLocation, ProbeTag, TagKind};

/// Matchable categories in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexCategory {
    CountryCode,
    CountryIso3,
    CountryName,
    CountryAlias,
    City,
    StateCode,
    StateIsoCode,
    StateName,
    ContinentCode,
    ContinentName,
    ContinentAlias,
    Region,
    RegionAlias,
    Asn,
    SystemTag,
    Network,
    NetworkAlias,
}

impl IndexCategory {
    pub const ALL: [IndexCategory; 17] = [
        IndexCategory::CountryCode,
        IndexCategory::CountryIso3,
        IndexCategory::CountryName,
        IndexCategory::CountryAlias,
        IndexCategory::City,
        IndexCategory::StateCode,
        IndexCategory::StateIsoCode,
        IndexCategory::StateName,
        IndexCategory::ContinentCode,
        IndexCategory::ContinentName,
        IndexCategory::ContinentAlias,
        IndexCategory::Region,
        IndexCategory::RegionAlias,
        IndexCategory::Asn,
        IndexCategory::SystemTag,
        IndexCategory::Network,
        IndexCategory::NetworkAlias,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn position(self) -> usize {
        self as usize
    }
}

/// Ordered index: `index[category.position()]` holds the lowercase keywords
/// this probe answers to in that category.
pub type ProbeIndex = Vec<Vec<String>>;

fn lower_all(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Build the index for a probe from its resolved location and tags.
pub fn build_probe_index(location: &ProbeLocation, tags: &[ProbeTag]) -> ProbeIndex {
    let mut index: ProbeIndex = vec![Vec::new(); IndexCategory::COUNT];
    let mut put = |category: IndexCategory, values: Vec<String>| {
        index[category.position()] = values.into_iter().filter(|v| !v.is_empty()).collect();
    };

    let country = geo::country(&location.country);
    put(IndexCategory::CountryCode, vec![location.country.to_lowercase()]);
    put(
        IndexCategory::CountryIso3,
        country.map(|c| vec![c.iso3.to_lowercase()]).unwrap_or_default(),
    );
    put(
        IndexCategory::CountryName,
        country.map(|c| vec![c.name.to_lowercase()]).unwrap_or_default(),
    );
    put(
        IndexCategory::CountryAlias,
        lower_all(geo::country_aliases(&location.country)),
    );
    put(IndexCategory::City, vec![location.normalized_city.clone()]);

    if let Some(state) = &location.state {
        put(IndexCategory::StateCode, vec![state.to_lowercase()]);
        put(
            IndexCategory::StateIsoCode,
            vec![format!("{}-{}", location.country, state).to_lowercase()],
        );
        put(
            IndexCategory::StateName,
            geo::us_state_name(state)
                .map(|name| vec![name.to_lowercase()])
                .unwrap_or_default(),
        );
    }

    put(IndexCategory::ContinentCode, vec![location.continent.to_lowercase()]);
    if let Some((name, aliases)) = geo::continent(&location.continent) {
        put(IndexCategory::ContinentName, vec![name.to_lowercase()]);
        put(IndexCategory::ContinentAlias, lower_all(aliases));
    }

    put(IndexCategory::Region, vec![location.region.to_lowercase()]);
    put(IndexCategory::RegionAlias, lower_all(geo::region_aliases(&location.region)));
    put(IndexCategory::Asn, vec![format!("as{}", location.asn)]);
    put(
        IndexCategory::SystemTag,
        tags.iter()
            .filter(|t| t.kind == TagKind::System)
            .map(|t| t.value.to_lowercase())
            .collect(),
    );
    put(IndexCategory::Network, vec![location.normalized_network.clone()]);
    put(
        IndexCategory::NetworkAlias,
        lower_all(geo::network_aliases(&location.normalized_network)),
    );

    index
}
