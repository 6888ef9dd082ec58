//! Location matching, weighted allocation and diversity shuffling.
//!
//! Everything here is synchronous and free of I/O. The only shared state is
//! the global keyword index, whose dynamic part is refreshed whenever the
//! connected probe set changes.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;

use super::location::{LocationCriterion, RequestLocation};
use crate::probe::{geo, IndexCategory, Probe, TagKind};

/// Keyword sets that depend on which probes are currently connected.
#[derive(Debug, Default)]
struct DynamicSets {
    cities: HashSet<String>,
    networks: HashSet<String>,
    system_tags: HashSet<String>,
    asns: HashSet<String>,
}

/// Matching engine over an in-memory probe list.
pub struct LocationFilter {
    /// One set per [`IndexCategory`]; empty for the dynamic categories.
    static_sets: Vec<HashSet<String>>,
    dynamic: RwLock<DynamicSets>,
    continent_weights: BTreeMap<String, u32>,
}

impl LocationFilter {
    pub fn new(continent_weights: BTreeMap<String, u32>) -> Self {
        Self {
            static_sets: build_static_sets(),
            dynamic: RwLock::new(DynamicSets::default()),
            continent_weights,
        }
    }

    /// Rebuild the connected-probe keyword sets.
    pub fn refresh_dynamic_index(&self, probes: &[Probe]) {
        let mut sets = DynamicSets::default();
        for probe in probes {
            let slot = |c: IndexCategory| probe.index.get(c.position()).into_iter().flatten();
            sets.cities.extend(slot(IndexCategory::City).cloned());
            sets.networks.extend(slot(IndexCategory::Network).cloned());
            sets.system_tags.extend(slot(IndexCategory::SystemTag).cloned());
            sets.asns.extend(slot(IndexCategory::Asn).cloned());
        }
        tracing::debug!(
            "LocationFilter: index refreshed ({} cities, {} networks, {} tags)",
            sets.cities.len(),
            sets.networks.len(),
            sets.system_tags.len()
        );
        *self.dynamic.write() = sets;
    }

    /// Lowest index position at which `keyword` exists anywhere.
    pub fn exact_position(&self, keyword: &str) -> Option<usize> {
        let dynamic = self.dynamic.read();
        IndexCategory::ALL
            .iter()
            .find(|category| match category {
                IndexCategory::City => dynamic.cities.contains(keyword),
                IndexCategory::Network => dynamic.networks.contains(keyword),
                IndexCategory::SystemTag => dynamic.system_tags.contains(keyword),
                IndexCategory::Asn => dynamic.asns.contains(keyword),
                other => self.static_sets[other.position()].contains(keyword),
            })
            .map(|category| category.position())
    }

    /// Narrow `probes` to those satisfying every rule of `location`.
    pub fn filter_by_location<'a>(&self, probes: &[&'a Probe], location: &RequestLocation) -> Vec<&'a Probe> {
        let mut candidates = probes.to_vec();

        for criterion in location.criteria() {
            candidates = match &criterion {
                LocationCriterion::Tags(tags) => candidates
                    .into_iter()
                    .filter(|probe| has_all_tags(probe, tags))
                    .collect(),
                LocationCriterion::Magic(magic) => self.magic_filter(&candidates, magic),
                plain => candidates
                    .into_iter()
                    .filter(|probe| plain.matches_field(&probe.location))
                    .collect(),
            };
            if candidates.is_empty() {
                break;
            }
        }

        candidates
    }

    /// Apply a `+`-joined keyword query. The result is an intersection, so
    /// keyword order only affects how fast the candidate set shrinks.
    pub fn magic_filter<'a>(&self, probes: &[&'a Probe], magic: &str) -> Vec<&'a Probe> {
        let mut keywords: Vec<(Option<usize>, String)> = parse_magic(magic)
            .into_iter()
            .map(|keyword| (self.exact_position(&keyword), keyword))
            .collect();
        keywords.sort_by_key(|(position, _)| position.unwrap_or(usize::MAX));

        let mut candidates = probes.to_vec();
        for (position, keyword) in &keywords {
            candidates.retain(|probe| match position {
                Some(position) => probe
                    .index
                    .get(*position)
                    .is_some_and(|slot| slot.iter().any(|v| v == keyword)),
                None => matches_partially(probe, keyword),
            });
            if candidates.is_empty() {
                break;
            }
        }
        candidates
    }

    /// Allocate `limit` probes across continents by configured weight.
    pub fn filter_globally_distributed<'a, R: Rng + ?Sized>(
        &self,
        probes: &[&'a Probe],
        limit: usize,
        rng: &mut R,
    ) -> Vec<&'a Probe> {
        let distribution: Vec<(RequestLocation, u32)> = self
            .continent_weights
            .iter()
            .map(|(continent, weight)| {
                let location = RequestLocation {
                    continent: Some(continent.clone()),
                    ..Default::default()
                };
                (location, *weight)
            })
            .collect();
        self.filter_by_location_and_weight(probes, &distribution, limit, rng)
    }

    /// Iterative proportional allocation. Each round hands every non-empty
    /// pool `max(1, remaining * weight / total_weight)` probes, then drops
    /// exhausted pools, until `limit` is reached or nothing is left.
    pub fn filter_by_location_and_weight<'a, R: Rng + ?Sized>(
        &self,
        probes: &[&'a Probe],
        distribution: &[(RequestLocation, u32)],
        limit: usize,
        rng: &mut R,
    ) -> Vec<&'a Probe> {
        let mut pools: Vec<(VecDeque<&'a Probe>, u64)> = distribution
            .iter()
            .filter(|(_, weight)| *weight > 0)
            .map(|(location, weight)| {
                let matched = self.filter_by_location(probes, location);
                let pool = self.shuffle_for_location(matched, location, rng);
                (VecDeque::from(pool), u64::from(*weight))
            })
            .filter(|(pool, _)| !pool.is_empty())
            .collect();

        let mut selected: Vec<&'a Probe> = Vec::with_capacity(limit.min(probes.len()));
        let mut seen: HashSet<&str> = HashSet::new();

        while selected.len() < limit && !pools.is_empty() {
            let remaining = (limit - selected.len()) as u64;
            let total_weight: u64 = pools.iter().map(|(_, weight)| weight).sum();

            for (pool, weight) in pools.iter_mut() {
                let mut quota = (remaining * *weight / total_weight).max(1);
                while quota > 0 && selected.len() < limit {
                    let Some(probe) = pool.pop_front() else { break };
                    if seen.insert(probe.uuid.as_str()) {
                        selected.push(probe);
                        quota -= 1;
                    }
                }
                if selected.len() >= limit {
                    break;
                }
            }

            pools.retain(|(pool, _)| !pool.is_empty());
        }

        selected
    }

    /// Order a location's matches: magic queries by match specificity,
    /// everything else by diversity.
    pub fn shuffle_for_location<'a, R: Rng + ?Sized>(
        &self,
        probes: Vec<&'a Probe>,
        location: &RequestLocation,
        rng: &mut R,
    ) -> Vec<&'a Probe> {
        match &location.magic {
            Some(magic) => magic_sort(probes, magic, rng),
            None => diversified_shuffle(probes, rng),
        }
    }
}

fn build_static_sets() -> Vec<HashSet<String>> {
    let mut sets = vec![HashSet::new(); IndexCategory::COUNT];
    let mut add = |category: IndexCategory, value: &str| {
        sets[category.position()].insert(value.to_lowercase());
    };

    for country in geo::COUNTRIES {
        add(IndexCategory::CountryCode, country.code);
        add(IndexCategory::CountryIso3, country.iso3);
        add(IndexCategory::CountryName, country.name);
    }
    for (_, aliases) in geo::COUNTRY_ALIASES {
        aliases.iter().for_each(|a| add(IndexCategory::CountryAlias, a));
    }
    for (code, name) in geo::US_STATES {
        add(IndexCategory::StateCode, code);
        add(IndexCategory::StateIsoCode, &format!("us-{code}"));
        add(IndexCategory::StateName, name);
    }
    for (code, name, aliases) in geo::CONTINENTS {
        add(IndexCategory::ContinentCode, code);
        add(IndexCategory::ContinentName, name);
        aliases.iter().for_each(|a| add(IndexCategory::ContinentAlias, a));
    }
    for (region, aliases) in geo::REGIONS {
        add(IndexCategory::Region, region);
        aliases.iter().for_each(|a| add(IndexCategory::RegionAlias, a));
    }
    for (_, aliases) in geo::NETWORK_ALIASES {
        aliases.iter().for_each(|a| add(IndexCategory::NetworkAlias, a));
    }

    sets
}

/// Split a magic query into lowercase keywords.
pub fn parse_magic(magic: &str) -> Vec<String> {
    magic
        .split('+')
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

fn has_all_tags(probe: &Probe, tags: &[String]) -> bool {
    tags.iter().all(|wanted| {
        probe
            .tags
            .iter()
            .filter(|t| t.kind != TagKind::Admin)
            .any(|t| t.value.eq_ignore_ascii_case(wanted))
    })
}

fn has_user_tag(probe: &Probe, keyword: &str) -> bool {
    probe
        .tags
        .iter()
        .any(|t| t.kind == TagKind::User && t.value.eq_ignore_ascii_case(keyword))
}

/// Fallback for keywords with no exact match anywhere: substring match across
/// every category, or an exact user tag for `u-` keywords.
fn matches_partially(probe: &Probe, keyword: &str) -> bool {
    let in_index = probe
        .index
        .iter()
        .flatten()
        .any(|value| value.contains(keyword));
    in_index || (keyword.starts_with("u-") && has_user_tag(probe, keyword))
}

/// Best (lowest) index position at which `keyword` matches this probe.
fn match_position(probe: &Probe, keyword: &str) -> Option<usize> {
    let exact = probe
        .index
        .iter()
        .position(|slot| slot.iter().any(|value| value == keyword));
    exact.or_else(|| {
        probe
            .index
            .iter()
            .position(|slot| slot.iter().any(|value| value.contains(keyword)))
    })
}

/// Group already-filtered probes by the most specific position any keyword
/// matched at, diversify within each group, and concatenate in ascending
/// position order.
pub fn magic_sort<'a, R: Rng + ?Sized>(probes: Vec<&'a Probe>, magic: &str, rng: &mut R) -> Vec<&'a Probe> {
    let keywords = parse_magic(magic);
    let mut groups: BTreeMap<usize, Vec<&'a Probe>> = BTreeMap::new();

    for probe in probes {
        let position = keywords
            .iter()
            .filter_map(|keyword| match_position(probe, keyword))
            .min()
            .unwrap_or(usize::MAX);
        groups.entry(position).or_default().push(probe);
    }

    groups
        .into_values()
        .flat_map(|group| diversified_shuffle(group, rng))
        .collect()
}

/// Compress a group size so large groups do not dominate linearly.
fn group_rank(size: usize) -> usize {
    if size < 8 {
        size / 2
    } else {
        (size as f64).log2().ceil() as usize
    }
}

struct ShuffleGroup<'a> {
    city: String,
    probes: Vec<&'a Probe>,
}

/// Random permutation biased toward geographic and network diversity near
/// the front. Probes are grouped by (location, ASN) and emitted round-robin,
/// one per group per pass; within a pass larger groups go first, and among
/// equal ranks the group whose city was emitted least often so far wins.
pub fn diversified_shuffle<'a, R: Rng + ?Sized>(probes: Vec<&'a Probe>, rng: &mut R) -> Vec<&'a Probe> {
    let total = probes.len();
    let mut by_key: HashMap<String, ShuffleGroup<'a>> = HashMap::new();

    for probe in probes {
        let loc = &probe.location;
        let city = format!(
            "{}-{}-{}",
            loc.country,
            loc.state.as_deref().unwrap_or(""),
            loc.normalized_city
        );
        let key = format!("{city}-{}", loc.asn);
        by_key
            .entry(key)
            .or_insert_with(|| ShuffleGroup {
                city,
                probes: Vec::new(),
            })
            .probes
            .push(probe);
    }

    let mut groups: Vec<ShuffleGroup<'a>> = by_key.into_values().collect();
    for group in &mut groups {
        group.probes.shuffle(rng);
    }

    let mut city_seen: HashMap<String, usize> = HashMap::new();
    let mut result = Vec::with_capacity(total);

    while !groups.is_empty() {
        // Random base order, then a stable sort keeps randomness among ties.
        groups.shuffle(rng);
        groups.sort_by_key(|group| {
            (
                Reverse(group_rank(group.probes.len())),
                city_seen.get(&group.city).copied().unwrap_or(0),
            )
        });

        for group in &mut groups {
            if let Some(probe) = group.probes.pop() {
                result.push(probe);
                *city_seen.entry(group.city.clone()).or_default() += 1;
            }
        }
        groups.retain(|group| !group.probes.is_empty());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_continent_weights;
    use crate::probe::tests::probe;
    use crate::probe::ProbeTag;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn filter_with(probes: &[Probe]) -> LocationFilter {
        let filter = LocationFilter::new(default_continent_weights());
        filter.refresh_dynamic_index(probes);
        filter
    }

    fn refs(probes: &[Probe]) -> Vec<&Probe> {
        probes.iter().collect()
    }

    fn uuids(probes: &[&Probe]) -> Vec<String> {
        let mut ids: Vec<String> = probes.iter().map(|p| p.uuid.clone()).collect();
        ids.sort();
        ids
    }

    fn fleet() -> Vec<Probe> {
        let mut probes = vec![
            probe(1, "EU", "PL", "Warsaw", 5617),
            probe(2, "EU", "PL", "Gdansk", 5617),
            probe(3, "EU", "DE", "Berlin", 3320),
            probe(4, "NA", "US", "Dallas", 16509),
            probe(5, "NA", "CA", "Toronto", 812),
            probe(6, "AS", "JP", "Tokyo", 2516),
        ];
        probes[0].tags.push(ProbeTag::new(TagKind::System, "eyeball-network"));
        probes[3].location.normalized_network = "amazon com inc".to_string();
        probes[3].tags.push(ProbeTag::new(TagKind::User, "u-carol-home"));
        for p in &mut probes {
            p.index = crate::probe::build_probe_index(&p.location, &p.tags);
        }
        probes
    }

    #[test]
    fn test_exact_position_priority() {
        let probes = fleet();
        let filter = filter_with(&probes);

        // "ca" is both Canada and California; the country code wins.
        assert_eq!(filter.exact_position("ca"), Some(IndexCategory::CountryCode.position()));
        assert_eq!(filter.exact_position("pol"), Some(IndexCategory::CountryIso3.position()));
        assert_eq!(filter.exact_position("california"), Some(IndexCategory::StateName.position()));
        assert_eq!(filter.exact_position("warsaw"), Some(IndexCategory::City.position()));
        assert_eq!(filter.exact_position("as3320"), Some(IndexCategory::Asn.position()));
        assert_eq!(filter.exact_position("aws"), Some(IndexCategory::NetworkAlias.position()));
        assert_eq!(filter.exact_position("atlantis"), None);
    }

    #[test]
    fn test_filter_by_plain_fields() {
        let probes = fleet();
        let filter = filter_with(&probes);
        let all = refs(&probes);

        let loc = RequestLocation {
            country: Some("pl".to_string()),
            ..Default::default()
        };
        assert_eq!(uuids(&filter.filter_by_location(&all, &loc)), vec!["uuid-1", "uuid-2"]);

        let loc = RequestLocation {
            continent: Some("EU".to_string()),
            city: Some("Berlin".to_string()),
            ..Default::default()
        };
        assert_eq!(uuids(&filter.filter_by_location(&all, &loc)), vec!["uuid-3"]);
    }

    #[test]
    fn test_filter_by_tags_requires_all() {
        let probes = fleet();
        let filter = filter_with(&probes);
        let all = refs(&probes);

        let loc = RequestLocation {
            tags: vec!["Eyeball-Network".to_string()],
            ..Default::default()
        };
        assert_eq!(uuids(&filter.filter_by_location(&all, &loc)), vec!["uuid-1"]);

        let loc = RequestLocation {
            tags: vec!["eyeball-network".to_string(), "datacenter-network".to_string()],
            ..Default::default()
        };
        assert!(filter.filter_by_location(&all, &loc).is_empty());
    }

    #[test]
    fn test_magic_filter_keywords() {
        let probes = fleet();
        let filter = filter_with(&probes);
        let all = refs(&probes);

        assert_eq!(uuids(&filter.magic_filter(&all, "poland")), vec!["uuid-1", "uuid-2"]);
        assert_eq!(uuids(&filter.magic_filter(&all, "europe+as5617")), vec!["uuid-1", "uuid-2"]);
        assert_eq!(uuids(&filter.magic_filter(&all, "aws")), vec!["uuid-4"]);
        assert_eq!(uuids(&filter.magic_filter(&all, "u-carol-home")), vec!["uuid-4"]);
        // No exact match anywhere: substring fallback.
        assert_eq!(uuids(&filter.magic_filter(&all, "warsa")), vec!["uuid-1"]);
        assert!(filter.magic_filter(&all, "pl+jp").is_empty());
    }

    #[test]
    fn test_magic_filter_is_order_independent() {
        let probes = fleet();
        let filter = filter_with(&probes);
        let all = refs(&probes);

        let queries = [
            ("eu+as5617+gdan", "gdan+as5617+eu"),
            ("north america+amazon", "amazon+north america"),
            ("pl+eyeball", "eyeball+pl"),
        ];
        for (a, b) in queries {
            assert_eq!(
                uuids(&filter.magic_filter(&all, a)),
                uuids(&filter.magic_filter(&all, b)),
                "{a} vs {b}"
            );
        }
    }

    #[test]
    fn test_diversified_shuffle_is_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut probes = Vec::new();
        for n in 0..40 {
            let city = ["Warsaw", "Berlin", "Paris"][n % 3];
            probes.push(probe(n, "EU", "PL", city, 100 + (n % 5) as u32));
        }
        let input = refs(&probes);

        let shuffled = diversified_shuffle(input.clone(), &mut rng);
        assert_eq!(shuffled.len(), input.len());
        assert_eq!(uuids(&shuffled), uuids(&input));
        assert!(diversified_shuffle(Vec::new(), &mut rng).is_empty());
    }

    #[test]
    fn test_diversified_shuffle_spreads_groups_early() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut probes: Vec<Probe> = (0..30).map(|n| probe(n, "EU", "DE", "Frankfurt", 1)).collect();
        probes.push(probe(100, "EU", "PL", "Warsaw", 2));
        probes.push(probe(101, "AS", "JP", "Tokyo", 3));

        let shuffled = diversified_shuffle(refs(&probes), &mut rng);
        let head: HashSet<&str> = shuffled[..3].iter().map(|p| p.location.country.as_str()).collect();
        assert_eq!(head.len(), 3, "each group should appear in the first pass");
    }

    #[test]
    fn test_weighted_allocation_respects_limit_and_minimum() {
        let mut rng = StdRng::seed_from_u64(1);
        let probes = fleet();
        let filter = filter_with(&probes);
        let all = refs(&probes);

        let distribution = vec![
            (RequestLocation { continent: Some("EU".to_string()), ..Default::default() }, 98),
            (RequestLocation { continent: Some("NA".to_string()), ..Default::default() }, 1),
            (RequestLocation { continent: Some("AS".to_string()), ..Default::default() }, 1),
        ];
        let selected = filter.filter_by_location_and_weight(&all, &distribution, 3, &mut rng);
        assert_eq!(selected.len(), 3);

        // Every pool gets at least one in the first round even at tiny weights.
        let selected = filter.filter_by_location_and_weight(&all, &distribution, 6, &mut rng);
        let continents: HashSet<&str> = selected.iter().map(|p| p.location.continent.as_str()).collect();
        assert_eq!(continents.len(), 3);
        assert_eq!(selected.len(), 6);

        for limit in 0..10 {
            let selected = filter.filter_by_location_and_weight(&all, &distribution, limit, &mut rng);
            assert!(selected.len() <= limit);
        }
    }

    #[test]
    fn test_weighted_allocation_deduplicates_overlapping_pools() {
        let mut rng = StdRng::seed_from_u64(3);
        let probes = fleet();
        let filter = filter_with(&probes);
        let all = refs(&probes);

        let distribution = vec![
            (RequestLocation { country: Some("PL".to_string()), ..Default::default() }, 50),
            (RequestLocation::magic("as5617"), 50),
        ];
        let selected = filter.filter_by_location_and_weight(&all, &distribution, 10, &mut rng);
        assert_eq!(uuids(&selected), vec!["uuid-1", "uuid-2"]);
    }

    #[test]
    fn test_globally_distributed_returns_all_when_pools_insufficient() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut probes = Vec::new();
        let mut n = 0;
        for (continent, country, count) in [("AF", "ZA", 15), ("EU", "DE", 20), ("OC", "AU", 10), ("NA", "US", 20)] {
            for _ in 0..count {
                probes.push(probe(n, continent, country, "City", n as u32));
                n += 1;
            }
        }
        let filter = filter_with(&probes);

        let selected = filter.filter_globally_distributed(&refs(&probes), 100, &mut rng);
        assert_eq!(selected.len(), 65);
        assert_eq!(uuids(&selected), uuids(&refs(&probes)));
    }

    #[test]
    fn test_magic_sort_groups_by_specificity() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut probes = fleet();
        // A probe whose city contains "pl" but is not in Poland.
        probes.push(probe(7, "NA", "US", "Plano", 7018));
        let input: Vec<&Probe> = probes.iter().filter(|p| p.uuid != "uuid-6").collect();

        let sorted = magic_sort(input, "pl", &mut rng);
        let countries: Vec<&str> = sorted.iter().map(|p| p.location.country.as_str()).collect();
        assert_eq!(&countries[..2], &["PL", "PL"]);
        assert_eq!(sorted.len(), 6);
    }
}
