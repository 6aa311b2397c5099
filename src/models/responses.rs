//! Response DTOs for the cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

/// Response body for lookups
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub namespace: String,
    /// The key as supplied by the caller
    pub key: Value,
    /// The cached value
    pub value: Value,
}

impl GetResponse {
    pub fn new(namespace: impl Into<String>, key: Value, value: Value) -> Self {
        Self {
            namespace: namespace.into(),
            key,
            value,
        }
    }
}

/// Response body for stores
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    pub namespace: String,
    pub key: Value,
}

impl SetResponse {
    pub fn new(namespace: impl Into<String>, key: Value) -> Self {
        let namespace = namespace.into();
        Self {
            message: format!("Key {} cached in '{}'", key, namespace),
            namespace,
            key,
        }
    }
}

/// Response body for `DELETE /cache/:namespace/:key`
#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    pub namespace: String,
    pub key: String,
    /// False when there was nothing to remove
    pub removed: bool,
}

impl RemoveResponse {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>, removed: bool) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            removed,
        }
    }
}

/// Response body for the clear endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Namespaces that were emptied
    pub cleared: Vec<String>,
}

/// Response body for `POST /flush`
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    /// Persistent namespaces written
    pub saved: usize,
}

/// Response body for `POST /import`
#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
    /// Entries that passed revalidation
    pub accepted: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
