//! Location filters as submitted in measurement requests.

use serde::{Deserialize, Serialize};

use crate::probe::{normalize_public_name, ProbeLocation};

/// One entry of a request's `locations` list. Only the set fields apply;
/// all of them must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic: Option<String>,
    /// Per-location probe limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// A single matching rule extracted from a [`RequestLocation`].
#[derive(Debug, Clone, PartialEq)]
pub enum LocationCriterion {
    Continent(String),
    Region(String),
    Country(String),
    State(String),
    City(String),
    Network(String),
    Tags(Vec<String>),
    Magic(String),
}

impl LocationCriterion {
    /// The probe field a plain criterion compares against. `None` for tags
    /// and magic, which need more than a single field.
    pub fn probe_field<'a>(&self, location: &'a ProbeLocation) -> Option<&'a str> {
        match self {
            LocationCriterion::Continent(_) => Some(&location.continent),
            LocationCriterion::Region(_) => Some(&location.region),
            LocationCriterion::Country(_) => Some(&location.country),
            LocationCriterion::State(_) => location.state.as_deref(),
            LocationCriterion::City(_) => Some(&location.normalized_city),
            LocationCriterion::Network(_) => Some(&location.normalized_network),
            LocationCriterion::Tags(_) | LocationCriterion::Magic(_) => None,
        }
    }

    /// The requested value, normalized the same way as the probe field.
    pub fn expected_value(&self) -> Option<String> {
        match self {
            LocationCriterion::City(v) | LocationCriterion::Network(v) => {
                Some(normalize_public_name(v))
            }
            LocationCriterion::Continent(v)
            | LocationCriterion::Region(v)
            | LocationCriterion::Country(v)
            | LocationCriterion::State(v) => Some(v.to_lowercase()),
            LocationCriterion::Tags(_) | LocationCriterion::Magic(_) => None,
        }
    }

    /// Plain equality check. Tags and magic always report `false` here.
    pub fn matches_field(&self, location: &ProbeLocation) -> bool {
        match (self.probe_field(location), self.expected_value()) {
            (Some(actual), Some(expected)) => actual.to_lowercase() == expected,
            _ => false,
        }
    }
}

impl RequestLocation {
    pub fn magic(value: impl Into<String>) -> Self {
        Self {
            magic: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn criteria(&self) -> Vec<LocationCriterion> {
        let mut criteria = Vec::new();
        let fields: [(&Option<String>, fn(String) -> LocationCriterion); 6] = [
            (&self.continent, LocationCriterion::Continent),
            (&self.region, LocationCriterion::Region),
            (&self.country, LocationCriterion::Country),
            (&self.state, LocationCriterion::State),
            (&self.city, LocationCriterion::City),
            (&self.network, LocationCriterion::Network),
        ];
        for (value, make) in fields {
            if let Some(v) = value {
                criteria.push(make(v.clone()));
            }
        }
        if !self.tags.is_empty() {
            criteria.push(LocationCriterion::Tags(self.tags.clone()));
        }
        if let Some(magic) = &self.magic {
            criteria.push(LocationCriterion::Magic(magic.clone()));
        }
        criteria
    }

    /// The magic string when it is the only matching rule of this location.
    pub fn magic_only(&self) -> Option<&str> {
        match self.criteria().as_slice() {
            [LocationCriterion::Magic(_)] => self.magic.as_deref(),
            _ => None,
        }
    }
}
