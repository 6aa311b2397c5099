//! Request DTOs for the cache API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

/// Body for `PUT /cache/:namespace/:key`
#[derive(Debug, Clone, Deserialize)]
pub struct SetValueRequest {
    /// The value to cache
    pub value: Value,
    /// Optional TTL override in milliseconds
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

impl SetValueRequest {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_ttl(self.ttl_ms)
    }
}

/// Body for `POST /cache/:namespace`
///
/// `key` is either a literal string or a parameter object.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreRequest {
    pub key: Value,
    pub value: Value,
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

impl StoreRequest {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key).or_else(|| validate_ttl(self.ttl_ms))
    }
}

/// Body for `POST /lookup/:namespace`
#[derive(Debug, Clone, Deserialize)]
pub struct LookupRequest {
    pub key: Value,
}

impl LookupRequest {
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }
}

fn validate_key(key: &Value) -> Option<String> {
    match key {
        Value::Null => Some("Key cannot be null".to_string()),
        Value::String(s) if s.is_empty() => Some("Key cannot be empty".to_string()),
        _ => None,
    }
}

fn validate_ttl(ttl_ms: Option<u64>) -> Option<String> {
    match ttl_ms {
        Some(0) => Some("TTL must be greater than zero".to_string()),
        _ => None,
    }
}
