//! Cache Entry Module
//!
//! Defines individual cache entries, their validity window, and the
//! compression envelope applied to stored values.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Synthetic recency credit granted per hit during eviction scoring.
pub const HIT_RECENCY_CREDIT_MS: u64 = 1000;

// == Cache Entry ==
/// A single memoized value plus the metadata driving expiry and eviction.
///
/// Field names serialize in camelCase to keep persisted snapshots stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Stored value, in envelope form when `compressed` is set
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Time to live in milliseconds
    pub ttl: u64,
    /// Successful reads since insertion
    #[serde(default)]
    pub hit_count: u64,
    /// Whether `value` holds the serialized envelope
    #[serde(default)]
    pub compressed: bool,
    /// Approximate serialized size, reporting only
    #[serde(default)]
    pub size_bytes: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(value: Value, ttl: Duration, compress: bool) -> Self {
        Self::with_created_at(value, ttl, compress, current_timestamp_ms())
    }

    /// Creates an entry with an explicit creation timestamp.
    pub fn with_created_at(value: Value, ttl: Duration, compress: bool, created_at: u64) -> Self {
        let encoded = encode(value, compress);
        Self {
            value: encoded.value,
            created_at,
            ttl: duration_to_ms(ttl),
            hit_count: 0,
            compressed: encoded.compressed,
            size_bytes: encoded.size_bytes,
        }
    }

    // == Age ==
    /// Milliseconds elapsed since creation at `now`; zero if the clock went backwards.
    pub fn age_at(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    // == Validity ==
    /// An entry is valid while its age is strictly below its TTL.
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.age_at(now) < self.ttl
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid_at(current_timestamp_ms())
    }

    /// Remaining lifetime in milliseconds, zero once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.ttl.saturating_sub(self.age_at(current_timestamp_ms()))
    }

    // == Recency Score ==
    /// Synthetic last-access time used by the eviction scan.
    ///
    /// Frequently hit entries look more recent without tracking real
    /// access instants.
    pub fn synthetic_last_access(&self) -> u64 {
        self.created_at
            .saturating_add(self.hit_count.saturating_mul(HIT_RECENCY_CREDIT_MS))
    }

    /// Records a successful read.
    pub fn record_hit(&mut self) {
        self.hit_count = self.hit_count.saturating_add(1);
    }

    /// Returns the caller-facing value, undoing the envelope if present.
    pub fn decoded_value(&self) -> Value {
        decode(&self.value, self.compressed)
    }
}

// == Compression Envelope ==
/// Output of [`encode`]: stored form plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedValue {
    pub value: Value,
    pub compressed: bool,
    pub size_bytes: usize,
}

/// Wraps a value for storage.
///
/// With compression on, the stored form is the normalized serialized string.
/// If serialization fails the raw value is kept uncompressed.
pub fn encode(value: Value, compress: bool) -> EncodedValue {
    match serde_json::to_string(&value) {
        Ok(serialized) => {
            let size_bytes = serialized.len();
            if compress {
                EncodedValue {
                    value: Value::String(serialized),
                    compressed: true,
                    size_bytes,
                }
            } else {
                EncodedValue {
                    value,
                    compressed: false,
                    size_bytes,
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "Value serialization failed, storing raw");
            EncodedValue {
                value,
                compressed: false,
                size_bytes: 0,
            }
        }
    }
}

/// Reverses [`encode`]. A stored form that fails to decode is returned as is.
pub fn decode(stored: &Value, compressed: bool) -> Value {
    if !compressed {
        return stored.clone();
    }
    match stored {
        Value::String(serialized) => serde_json::from_str(serialized).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Envelope decode failed, returning stored form");
            stored.clone()
        }),
        other => other.clone(),
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub(crate) fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
