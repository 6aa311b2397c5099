//! API Handlers
//!
//! HTTP request handlers for each cache endpoint.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::warn;

use crate::cache::{
    CacheExport, DurableStore, FileStore, MemoryStore, NamespacedCache, SharedCache,
    StatisticsReport,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, FlushResponse, GetResponse, HealthResponse, ImportResponse, LookupRequest,
    RemoveResponse, SetResponse, SetValueRequest, StoreRequest,
};
use crate::tasks::flush_shared;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: SharedCache,
}

impl AppState {
    /// Wraps a cache for sharing.
    pub fn new(cache: NamespacedCache) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    /// Builds the cache and its storage backend from configuration.
    ///
    /// A storage directory that cannot be opened downgrades to in-memory
    /// storage rather than failing startup.
    pub fn from_config(config: &Config) -> Self {
        let storage: Arc<dyn DurableStore> = match &config.storage_dir {
            Some(dir) => match FileStore::open(dir) {
                Ok(store) => Arc::new(store),
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "Storage unavailable, using in-memory store");
                    Arc::new(MemoryStore::new())
                }
            },
            None => Arc::new(MemoryStore::new()),
        };

        Self::new(NamespacedCache::new(&config.cache, storage))
    }
}

/// Distinguishes an unknown namespace from a plain miss.
fn miss_error(cache: &NamespacedCache, namespace: &str, key: &Value) -> CacheError {
    if cache.has_namespace(namespace) {
        CacheError::NotFound(key.to_string())
    } else {
        CacheError::UnknownNamespace(namespace.to_string())
    }
}

async fn lookup(state: &AppState, namespace: String, key: Value) -> Result<Json<GetResponse>> {
    let mut cache = state.cache.write().await;
    match cache.get(&namespace, &key) {
        Some(value) => Ok(Json(GetResponse::new(namespace, key, value))),
        None => Err(miss_error(&cache, &namespace, &key)),
    }
}

async fn store(
    state: &AppState,
    namespace: String,
    key: Value,
    value: Value,
    ttl: Option<std::time::Duration>,
) -> Result<Json<SetResponse>> {
    let mut cache = state.cache.write().await;
    if cache.set(&namespace, &key, value, ttl) {
        Ok(Json(SetResponse::new(namespace, key)))
    } else {
        Err(CacheError::UnknownNamespace(namespace))
    }
}

/// Handler for GET /cache/:namespace/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    lookup(&state, namespace, Value::String(key)).await
}

/// Handler for PUT /cache/:namespace/:key
pub async fn set_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Json(req): Json<SetValueRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    let ttl = req.ttl();
    store(&state, namespace, Value::String(key), req.value, ttl).await
}

/// Handler for DELETE /cache/:namespace/:key
pub async fn remove_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Json<RemoveResponse>> {
    let mut cache = state.cache.write().await;
    if !cache.has_namespace(&namespace) {
        return Err(CacheError::UnknownNamespace(namespace));
    }
    let removed = cache.remove(&namespace, &Value::String(key.clone()));

    Ok(Json(RemoveResponse::new(namespace, key, removed)))
}

/// Handler for POST /lookup/:namespace
pub async fn lookup_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<LookupRequest>,
) -> Result<Json<GetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    lookup(&state, namespace, req.key).await
}

/// Handler for POST /cache/:namespace
pub async fn store_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    let ttl = req.ttl();
    store(&state, namespace, req.key, req.value, ttl).await
}

/// Handler for DELETE /cache/:namespace
pub async fn clear_namespace_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<ClearResponse>> {
    let mut cache = state.cache.write().await;
    if !cache.has_namespace(&namespace) {
        return Err(CacheError::UnknownNamespace(namespace));
    }
    cache.clear(Some(&namespace));

    Ok(Json(ClearResponse {
        cleared: vec![namespace],
    }))
}

/// Handler for DELETE /cache
pub async fn clear_all_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let mut cache = state.cache.write().await;
    cache.clear(None);

    Json(ClearResponse {
        cleared: cache.namespace_names(),
    })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatisticsReport> {
    let cache = state.cache.read().await;
    Json(cache.statistics())
}

/// Handler for GET /export
pub async fn export_handler(State(state): State<AppState>) -> Json<CacheExport> {
    let cache = state.cache.read().await;
    Json(cache.export_all())
}

/// Handler for POST /import
pub async fn import_handler(
    State(state): State<AppState>,
    Json(data): Json<CacheExport>,
) -> Json<ImportResponse> {
    let mut cache = state.cache.write().await;
    Json(ImportResponse {
        accepted: cache.import_all(data),
    })
}

/// Handler for POST /flush
///
/// The host calls this when it is about to be suspended.
pub async fn flush_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    Json(FlushResponse {
        saved: flush_shared(&state.cache).await,
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use serde_json::json;

    fn test_state() -> AppState {
        AppState::new(NamespacedCache::in_memory(&CacheConfig::default()))
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let req = SetValueRequest {
            value: json!({"price": 45}),
            ttl_ms: None,
        };
        let path = ("configurations".to_string(), "product_cleaning".to_string());
        let result = set_handler(State(state.clone()), Path(path.clone()), Json(req)).await;
        assert!(result.is_ok());

        let response = get_handler(State(state), Path(path)).await.unwrap();
        assert_eq!(response.value, json!({"price": 45}));
    }

    #[tokio::test]
    async fn test_get_miss_and_unknown_namespace() {
        let state = test_state();

        let miss = get_handler(
            State(state.clone()),
            Path(("calculations".to_string(), "nope".to_string())),
        )
        .await;
        assert!(matches!(miss, Err(CacheError::NotFound(_))));

        let unknown = get_handler(State(state), Path(("nope".to_string(), "k".to_string()))).await;
        assert!(matches!(unknown, Err(CacheError::UnknownNamespace(_))));
    }

    #[tokio::test]
    async fn test_store_and_lookup_structured_key() {
        let state = test_state();
        let key = json!({"cleaningProducts": "standard", "waterConsumption": "medium"});

        let req = StoreRequest {
            key: key.clone(),
            value: json!(12),
            ttl_ms: Some(60_000),
        };
        store_handler(State(state.clone()), Path("calculations".to_string()), Json(req))
            .await
            .unwrap();

        let lookup = LookupRequest {
            key: json!({"waterConsumption": "medium", "cleaningProducts": "standard"}),
        };
        let response = lookup_handler(State(state), Path("calculations".to_string()), Json(lookup))
            .await
            .unwrap();
        assert_eq!(response.value, json!(12));
    }

    #[tokio::test]
    async fn test_remove_handler() {
        let state = test_state();
        state
            .cache
            .write()
            .await
            .set("projections", &json!("p"), json!(1), None);

        let path = ("projections".to_string(), "p".to_string());
        let first = remove_handler(State(state.clone()), Path(path.clone())).await.unwrap();
        assert!(first.removed);
        let second = remove_handler(State(state), Path(path)).await.unwrap();
        assert!(!second.removed);
    }

    #[tokio::test]
    async fn test_clear_handlers() {
        let state = test_state();
        state
            .cache
            .write()
            .await
            .set("projections", &json!("p"), json!(1), None);

        let unknown = clear_namespace_handler(State(state.clone()), Path("nope".to_string())).await;
        assert!(unknown.is_err());

        let response = clear_all_handler(State(state.clone())).await;
        assert_eq!(response.cleared.len(), 5);
        assert_eq!(state.cache.read().await.len("projections"), Some(0));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        let response = stats_handler(State(state)).await;
        assert_eq!(response.counters.hits, 0);
        assert_eq!(response.namespaces.len(), 5);
    }

    #[tokio::test]
    async fn test_flush_handler_saves_persistent_namespaces() {
        let state = test_state();
        let response = flush_handler(State(state)).await;
        assert_eq!(response.saved, 2);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();
        let req = SetValueRequest {
            value: json!(1),
            ttl_ms: Some(0),
        };
        let result = set_handler(
            State(state),
            Path(("calculations".to_string(), "k".to_string())),
            Json(req),
        )
        .await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }
}
