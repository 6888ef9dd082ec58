//! Measurement ids.
//!
//! Layout (17 base62 chars): 8 chars of creation time in epoch milliseconds,
//! 1 tier char, 8 random chars. The alphabet is in ASCII order, so ids sort
//! by creation time and the id alone locates the cold-tier partition.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const TIME_LEN: usize = 8;
const RANDOM_LEN: usize = 8;
pub const ID_LEN: usize = TIME_LEN + 1 + RANDOM_LEN;

/// Coarse user classification; selects the cold-storage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Anonymous,
    Member,
    Special,
}

impl UserTier {
    pub const ALL: [UserTier; 3] = [UserTier::Anonymous, UserTier::Member, UserTier::Special];

    fn as_char(self) -> char {
        match self {
            UserTier::Anonymous => '0',
            UserTier::Member => '1',
            UserTier::Special => '2',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(UserTier::Anonymous),
            '1' => Some(UserTier::Member),
            '2' => Some(UserTier::Special),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserTier::Anonymous => "anonymous",
            UserTier::Member => "member",
            UserTier::Special => "special",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.as_str() == name)
    }
}

/// What an id tells us without any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedId {
    pub created_at: DateTime<Utc>,
    pub tier: UserTier,
}

fn encode_base62(mut value: u64, len: usize) -> String {
    let mut out = vec![b'0'; len];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[(value % 62) as usize];
        value /= 62;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn decode_base62(s: &str) -> Option<u64> {
    s.bytes().try_fold(0u64, |acc, b| {
        let digit = ALPHABET.iter().position(|&a| a == b)? as u64;
        acc.checked_mul(62)?.checked_add(digit)
    })
}

/// Generate a new id for a measurement created at `created_at`.
pub fn generate_measurement_id(created_at: DateTime<Utc>, tier: UserTier) -> String {
    let millis = created_at.timestamp_millis().max(0) as u64;
    let mut rng = rand::thread_rng();
    let random: String = (0..RANDOM_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}{}{}", encode_base62(millis, TIME_LEN), tier.as_char(), random)
}

/// Decode creation time and tier. `None` for anything that is not one of our ids.
pub fn parse_measurement_id(id: &str) -> Option<ParsedId> {
    if id.len() != ID_LEN || !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let millis = decode_base62(&id[..TIME_LEN])?;
    let tier = UserTier::from_char(id[TIME_LEN..].chars().next()?)?;
    let created_at = DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)?;
    Some(ParsedId { created_at, tier })
}

/// Cold-tier partition key: creation time truncated to the bucket width.
pub fn truncate_to_bucket(dt: DateTime<Utc>, bucket: std::time::Duration) -> DateTime<Utc> {
    let width = bucket.as_secs().max(1) as i64;
    let ts = dt.timestamp();
    DateTime::from_timestamp(ts - ts.rem_euclid(width), 0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_id_encodes_time_and_tier() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let id = generate_measurement_id(created, UserTier::Member);
        assert_eq!(id.len(), ID_LEN);

        let parsed = parse_measurement_id(&id).unwrap();
        assert_eq!(parsed.created_at, created);
        assert_eq!(parsed.tier, UserTier::Member);
    }

    #[test]
    fn test_ids_sort_by_creation_time() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut ids: Vec<String> = (0..50)
            .map(|i| generate_measurement_id(t0 + Duration::milliseconds(i * 997), UserTier::Special))
            .collect();
        let generated = ids.clone();
        ids.sort();
        assert_eq!(ids, generated);
    }

    #[test]
    fn test_rejects_foreign_ids() {
        assert!(parse_measurement_id("").is_none());
        assert!(parse_measurement_id("not-an-id").is_none());
        assert!(parse_measurement_id("0000000090000000z").is_none()); // bad tier
        assert!(parse_measurement_id("zzzzzzzz0-0000000").is_none());
    }

    #[test]
    fn test_truncate_to_bucket() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 1, 12, 34, 56).unwrap();
        let hour = std::time::Duration::from_secs(3600);
        assert_eq!(truncate_to_bucket(dt, hour), Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());

        let ms = dt + Duration::milliseconds(999);
        assert_eq!(truncate_to_bucket(ms, hour), truncate_to_bucket(dt, hour));
    }
}
