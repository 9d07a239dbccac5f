use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a read result may be reused before it must be reloaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Time to live, in milliseconds.
    pub ttl_ms: u64,
}

impl CachePolicy {
    pub fn new(ttl_ms: u64) -> Self {
        Self { ttl_ms }
    }

    /// A policy under which results expire immediately.
    pub fn no_caching() -> Self {
        Self { ttl_ms: 0 }
    }

    /// When a result loaded at `loaded_at` stops being valid.
    pub fn expires_at(&self, loaded_at: DateTime<Utc>) -> DateTime<Utc> {
        let ttl = i64::try_from(self.ttl_ms).unwrap_or(i64::MAX);
        loaded_at + Duration::milliseconds(ttl)
    }

    /// Returns `true` if a result loaded at `loaded_at` is stale at `now`.
    pub fn is_expired(&self, loaded_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now >= self.expires_at(loaded_at)
    }
}
