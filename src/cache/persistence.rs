//! Persistence Module
//!
//! Durable key/value backends and the snapshot format used for persistent
//! namespaces.
//!
//! # Payload Format
//!
//! Each namespace is stored under `expense_cache:<namespace>` as a JSON
//! array of `[key, entry]` pairs:
//!
//! ```text
//! [["product_cleaning", {"value": "...", "createdAt": 1700000000000,
//!   "ttl": 86400000, "hitCount": 2, "compressed": true, "sizeBytes": 12}]]
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

/// Reserved prefix for every key the cache writes.
pub const STORAGE_KEY_PREFIX: &str = "expense_cache:";

/// Storage key for a namespace snapshot.
pub fn storage_key(namespace: &str) -> String {
    format!("{}{}", STORAGE_KEY_PREFIX, namespace)
}

// == Durable Store ==
/// Host-provided key/value store.
pub trait DurableStore: Send + Sync + Debug {
    /// Reads a value, `Ok(None)` when the key was never written.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

// == Memory Store ==
/// Process-local store. Survives cache instances, not process restarts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// == File Store ==
/// One file per key inside a directory.
///
/// Each write goes to its own temp file in the same directory and is renamed
/// into place, so concurrent writers never share a temp path.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) the storage directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.contains('\0')
        {
            return Err(CacheError::Storage(format!("Invalid storage key: {:?}", key)));
        }
        // ':' is not portable in file names
        Ok(self.dir.join(format!("{}.json", key.replace(':', "__"))))
    }
}

impl DurableStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;

        let mut file = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        file.write_all(value.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|err| err.error)?;

        Ok(())
    }
}

// == Snapshot ==
/// Serialized form of one persistent namespace, ready to write.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceSnapshot {
    pub namespace: String,
    pub payload: String,
}

/// Serializes `(key, entry)` pairs into the namespace payload.
pub fn encode_payload<'a, I>(entries: I) -> Result<String>
where
    I: IntoIterator<Item = (&'a String, &'a CacheEntry)>,
{
    let pairs: Vec<(&String, &CacheEntry)> = entries.into_iter().collect();
    Ok(serde_json::to_string(&pairs)?)
}

/// Parses a namespace payload, keeping only structurally sound entries.
///
/// A payload that is not a list of pairs is an error; individual malformed
/// pairs are dropped silently.
pub fn decode_payload(payload: &str) -> Result<Vec<(String, CacheEntry)>> {
    let pairs: Vec<Value> = serde_json::from_str(payload)?;

    Ok(pairs
        .into_iter()
        .filter_map(|pair| serde_json::from_value::<(String, CacheEntry)>(pair).ok())
        .collect())
}

/// Reads one namespace from storage. Failures are logged and yield nothing.
#[instrument(skip(store))]
pub fn load_namespace(store: &dyn DurableStore, namespace: &str) -> Vec<(String, CacheEntry)> {
    let key = storage_key(namespace);
    let payload = match store.read(&key) {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            debug!("No persisted snapshot");
            return Vec::new();
        }
        Err(err) => {
            warn!(error = %err, "Failed to read persisted namespace, starting empty");
            return Vec::new();
        }
    };

    match decode_payload(&payload) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(error = %err, "Corrupt persisted namespace, starting empty");
            Vec::new()
        }
    }
}

/// Writes snapshots, skipping (and logging) any that fail.
///
/// Returns the number of namespaces written.
#[instrument(skip_all, fields(count = snapshots.len()))]
pub fn write_snapshots(store: &dyn DurableStore, snapshots: &[NamespaceSnapshot]) -> usize {
    let mut written = 0;
    for snapshot in snapshots {
        match store.write(&storage_key(&snapshot.namespace), &snapshot.payload) {
            Ok(()) => {
                written += 1;
                debug!(namespace = %snapshot.namespace, bytes = snapshot.payload.len(), "Namespace saved");
            }
            Err(err) => {
                warn!(namespace = %snapshot.namespace, error = %err, "Failed to save namespace, skipping this cycle");
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    fn sample_entry() -> CacheEntry {
        CacheEntry::with_created_at(json!({"price": 45}), Duration::from_secs(60), true, 1_000)
    }

    #[test]
    fn test_storage_key_prefix() {
        assert_eq!(storage_key("configurations"), "expense_cache:configurations");
    }

    #[test]
    fn test_memory_store_read_write() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.read("missing").unwrap(), None);

        assert_ok!(store.write("k", "v1"));
        assert_ok!(store.write("k", "v2"));
        assert_eq!(store.read("k").unwrap(), Some("v2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("snapshots")).unwrap();

        assert_eq!(store.read("expense_cache:configurations").unwrap(), None);
        assert_ok!(store.write("expense_cache:configurations", "[]"));
        assert_eq!(
            store.read("expense_cache:configurations").unwrap(),
            Some("[]".to_string())
        );

        // No temp file left behind
        let leftovers: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_file_store_concurrent_writes_to_one_key() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = "expense_cache:configurations";
        let large = format!("[{}]", "1,".repeat(5_000) + "1");
        let small = "[1]".to_string();

        for _ in 0..50 {
            std::thread::scope(|scope| {
                let first = scope.spawn(|| store.write(key, &large));
                let second = scope.spawn(|| store.write(key, &small));
                assert_ok!(first.join().unwrap());
                assert_ok!(second.join().unwrap());
            });

            let saved = store.read(key).unwrap().unwrap();
            assert!(saved == large || saved == small);
        }

        let files: Vec<_> = fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_file_store_rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert_err!(store.write("../outside", "x"));
        assert_err!(store.write("a/b", "x"));
        assert_err!(store.read(""));
    }

    #[test]
    fn test_payload_round_trip() {
        let key = "product_cleaning".to_string();
        let entry = sample_entry();
        let payload = encode_payload(vec![(&key, &entry)]).unwrap();

        let decoded = decode_payload(&payload).unwrap();
        assert_eq!(decoded, vec![(key, entry)]);
    }

    #[test]
    fn test_decode_drops_malformed_pairs() {
        let payload = r#"[
            ["good", {"value": 1, "createdAt": 10, "ttl": 100, "hitCount": 0, "compressed": false, "sizeBytes": 1}],
            ["no_timestamp", {"value": 1, "ttl": 100}],
            ["no_ttl", {"value": 1, "createdAt": 10}],
            "not a pair"
        ]"#;

        let decoded = decode_payload(payload).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0, "good");
    }

    #[test]
    fn test_decode_rejects_corrupt_payload() {
        assert!(decode_payload("{corrupt").is_err());
        assert!(decode_payload(r#"{"an": "object"}"#).is_err());
    }

    #[test]
    fn test_load_namespace_tolerates_corruption() {
        let store = MemoryStore::new();
        store.write(&storage_key("configurations"), "garbage").unwrap();

        assert!(load_namespace(&store, "configurations").is_empty());
        assert!(load_namespace(&store, "never_written").is_empty());
    }

    #[derive(Debug)]
    struct BrokenStore;

    impl DurableStore for BrokenStore {
        fn read(&self, _key: &str) -> Result<Option<String>> {
            Err(CacheError::Storage("unavailable".into()))
        }

        fn write(&self, _key: &str, _value: &str) -> Result<()> {
            Err(CacheError::Storage("quota exceeded".into()))
        }
    }

    #[test]
    fn test_unavailable_store_is_non_fatal() {
        assert!(load_namespace(&BrokenStore, "configurations").is_empty());

        let snapshots = vec![NamespaceSnapshot {
            namespace: "configurations".into(),
            payload: "[]".into(),
        }];
        assert_eq!(write_snapshots(&BrokenStore, &snapshots), 0);
    }
}
