//! Cache entries - a result plus its validity window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::key::CacheKey;
use super::result::ExtractionResult;

/// Default time-to-live for cached extraction results.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// A cached extraction result.
///
/// Entries carry their own TTL so that a store can hold entries written
/// under different configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key this entry is stored under
    pub key: CacheKey,

    /// Extraction payload
    pub result: ExtractionResult,

    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// Validity window, in seconds
    #[serde(with = "ttl_seconds")]
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create an entry stamped now with the default TTL.
    pub fn new(key: CacheKey, result: ExtractionResult) -> Self {
        Self {
            key,
            result,
            created_at: Utc::now(),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    /// Set the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// When the entry stops being served.
    ///
    /// Saturates at the ends of the representable range: a TTL too long to
    /// add never expires, one too negative is already expired.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(self.ttl)
            .unwrap_or(if self.ttl < Duration::zero() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            })
    }

    /// Whether the entry has expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Whether the entry has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

mod ttl_seconds {
    use chrono::Duration;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(ttl.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Duration::try_seconds(secs)
            .ok_or_else(|| D::Error::custom(format!("ttl out of range: {secs}s")))
    }
}
