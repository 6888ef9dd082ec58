//! Configuration module for Vantage.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Any read-only key-value source can be used through [`Config::from_lookup`].

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::measurement::UserTier;

/// Prefix shared by every environment variable.
const ENV_PREFIX: &str = "VANTAGE_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Cold-tier table names, one per user tier.
#[derive(Debug, Clone)]
pub struct TierTables {
    pub anonymous: String,
    pub member: String,
    pub special: String,
}

impl TierTables {
    pub fn table_for(&self, tier: UserTier) -> &str {
        match tier {
            UserTier::Anonymous => &self.anonymous,
            UserTier::Member => &self.member,
            UserTier::Special => &self.special,
        }
    }
}

impl Default for TierTables {
    fn default() -> Self {
        Self {
            anonymous: "measurement_anonymous".to_string(),
            member: "measurement_member".to_string(),
            special: "measurement_special".to_string(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port for the API adapter (default: 8080)
    pub http_port: u16,
    /// Path to the cold-tier SQLite database (default: "vantage.db")
    pub db_path: String,
    /// Optional JSON file with the probe list served by the bundled registry
    pub probes_path: Option<String>,
    /// Time after which in-progress results are force-failed
    pub measurement_timeout: Duration,
    /// TTL of hot-tier measurement documents
    pub result_ttl: Duration,
    /// TTL of the test correlation map
    pub test_map_ttl: Duration,
    /// Hot-tier TTL applied once a record is archived
    pub offloaded_ttl: Duration,
    /// Records older than this are read from the cold tier first
    pub cold_read_after: Duration,
    /// Continent code -> weight used for globally distributed selection
    pub continent_weights: BTreeMap<String, u32>,
    pub tier_tables: TierTables,
    pub offload_batch_size: usize,
    pub offload_flush_interval: Duration,
    /// Width of the cold-tier created_at bucket
    pub offload_bucket: Duration,
    pub cleanup_interval: Duration,
    pub cleanup_page_size: usize,
    pub retry_concurrency: usize,
    pub retry_max_attempts: u32,
    pub retry_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "vantage.db".to_string(),
            probes_path: None,
            measurement_timeout: Duration::from_secs(30),
            result_ttl: Duration::from_secs(7 * 24 * 3600),
            test_map_ttl: Duration::from_secs(3600),
            offloaded_ttl: Duration::from_secs(3600),
            cold_read_after: Duration::from_secs(30 * 60),
            continent_weights: default_continent_weights(),
            tier_tables: TierTables::default(),
            offload_batch_size: 100,
            offload_flush_interval: Duration::from_millis(1000),
            offload_bucket: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(5),
            cleanup_page_size: 5000,
            retry_concurrency: 4,
            retry_max_attempts: 8,
            retry_poll_interval: Duration::from_secs(5),
        }
    }
}

/// Default per-continent weights, summing to 100.
pub fn default_continent_weights() -> BTreeMap<String, u32> {
    [("AF", 5), ("AS", 15), ("EU", 30), ("OC", 10), ("NA", 30), ("SA", 10)]
        .into_iter()
        .map(|(code, weight)| (code.to_string(), weight))
        .collect()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every key is read as `VANTAGE_<KEY>`, e.g. `VANTAGE_HTTP_PORT` or
    /// `VANTAGE_CONTINENT_WEIGHTS=AF:5,EU:30`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Build configuration from an arbitrary key-value lookup. Missing keys
    /// keep their defaults; present but malformed values are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse_key(&lookup, "HTTP_PORT")? {
            cfg.http_port = port;
        }
        if let Some(db_path) = lookup("DB_PATH") {
            cfg.db_path = db_path;
        }
        cfg.probes_path = lookup("PROBES_PATH").filter(|p| !p.is_empty());

        let secs = |key: &str| -> Result<Option<Duration>, ConfigError> {
            Ok(parse_key::<u64, _>(&lookup, key)?.map(Duration::from_secs))
        };
        if let Some(d) = secs("MEASUREMENT_TIMEOUT_SECS")? {
            cfg.measurement_timeout = d;
        }
        if let Some(d) = secs("RESULT_TTL_SECS")? {
            cfg.result_ttl = d;
        }
        if let Some(d) = secs("TEST_MAP_TTL_SECS")? {
            cfg.test_map_ttl = d;
        }
        if let Some(d) = secs("OFFLOADED_TTL_SECS")? {
            cfg.offloaded_ttl = d;
        }
        if let Some(d) = secs("COLD_READ_AFTER_SECS")? {
            cfg.cold_read_after = d;
        }
        if let Some(d) = secs("OFFLOAD_BUCKET_SECS")? {
            cfg.offload_bucket = d;
        }
        // Background loop intervals must be non-zero.
        let positive_secs = |key: &str| -> Result<Option<Duration>, ConfigError> {
            match secs(key)? {
                Some(d) if d.is_zero() => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "0".to_string(),
                }),
                d => Ok(d),
            }
        };
        if let Some(d) = positive_secs("CLEANUP_INTERVAL_SECS")? {
            cfg.cleanup_interval = d;
        }
        if let Some(d) = positive_secs("RETRY_POLL_SECS")? {
            cfg.retry_poll_interval = d;
        }
        if let Some(ms) = parse_key::<u64, _>(&lookup, "OFFLOAD_FLUSH_MS")? {
            cfg.offload_flush_interval = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup("CONTINENT_WEIGHTS") {
            cfg.continent_weights = parse_weights(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "CONTINENT_WEIGHTS".to_string(),
                value: raw.clone(),
            })?;
        }

        for (key, slot) in [
            ("TABLE_ANONYMOUS", &mut cfg.tier_tables.anonymous),
            ("TABLE_MEMBER", &mut cfg.tier_tables.member),
            ("TABLE_SPECIAL", &mut cfg.tier_tables.special),
        ] {
            if let Some(name) = lookup(key) {
                if !is_valid_table_name(&name) {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: name,
                    });
                }
                *slot = name;
            }
        }

        if let Some(n) = parse_key(&lookup, "OFFLOAD_BATCH_SIZE")? {
            cfg.offload_batch_size = n;
        }
        if let Some(n) = parse_key(&lookup, "CLEANUP_PAGE_SIZE")? {
            cfg.cleanup_page_size = n;
        }
        if let Some(n) = parse_key(&lookup, "RETRY_CONCURRENCY")? {
            cfg.retry_concurrency = n;
        }
        if let Some(n) = parse_key(&lookup, "RETRY_MAX_ATTEMPTS")? {
            cfg.retry_max_attempts = n;
        }

        Ok(cfg)
    }
}

fn parse_key<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// Parse `AF:5,EU:30` into a weight map.
fn parse_weights(raw: &str) -> Option<BTreeMap<String, u32>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (code, weight) = part.split_once(':')?;
            Some((code.trim().to_uppercase(), weight.trim().parse().ok()?))
        })
        .collect()
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn is_valid_table_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid regex"))
        .is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "vantage.db");
        assert_eq!(cfg.measurement_timeout, Duration::from_secs(30));
        assert_eq!(cfg.continent_weights.values().sum::<u32>(), 100);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("HTTP_PORT", "9000"),
            ("MEASUREMENT_TIMEOUT_SECS", "45"),
            ("CONTINENT_WEIGHTS", "eu:60, na:40"),
            ("TABLE_MEMBER", "archive_member"),
            ("OFFLOAD_FLUSH_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.measurement_timeout, Duration::from_secs(45));
        assert_eq!(cfg.continent_weights.get("EU"), Some(&60));
        assert_eq!(cfg.continent_weights.len(), 2);
        assert_eq!(cfg.tier_tables.table_for(UserTier::Member), "archive_member");
        assert_eq!(cfg.offload_flush_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("HTTP_PORT", "eighty")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("CONTINENT_WEIGHTS", "EU=3")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("TABLE_SPECIAL", "x; DROP TABLE y")])).is_err());
    }

    #[test]
    fn test_zero_loop_intervals_are_rejected() {
        for key in ["RETRY_POLL_SECS", "CLEANUP_INTERVAL_SECS"] {
            let err = Config::from_lookup(lookup_from(&[(key, "0")])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { key: ref k, .. } if k == key));
        }

        let cfg = Config::from_lookup(lookup_from(&[("RETRY_POLL_SECS", "1")])).unwrap();
        assert_eq!(cfg.retry_poll_interval, Duration::from_secs(1));
    }
}
