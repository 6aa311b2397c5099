//! Configuration Module
//!
//! Handles loading the cache policy set and server settings from environment
//! variables. Configuration is read once at startup and never mutated.

use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Policy override for a single namespace.
///
/// Absent fields fall back to the global defaults in [`CacheConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Namespace name, e.g. `calculations`
    pub name: String,
    /// Namespace TTL override
    pub ttl: Option<Duration>,
    /// Namespace capacity override
    pub max_size: Option<usize>,
}

impl NamespaceConfig {
    pub fn new(name: impl Into<String>, ttl: Option<Duration>, max_size: Option<usize>) -> Self {
        Self {
            name: name.into(),
            ttl,
            max_size,
        }
    }

    /// Parses a `name:ttl_ms:max_size` spec. Blank fields are left unset.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.trim().split(':');
        let name = parts.next()?.trim();
        if name.is_empty() {
            return None;
        }

        let ttl = match parts.next().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Duration::from_millis(raw.parse().ok()?)),
        };
        let max_size = match parts.next().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse().ok()?),
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self::new(name, ttl, max_size))
    }
}

/// Cache policy configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default per-namespace capacity
    pub max_cache_size: usize,
    /// Fallback TTL for namespaces without an override
    pub default_ttl: Duration,
    /// Period of the background sweep
    pub cleanup_interval: Duration,
    /// Global switch for the compression envelope
    pub compression_enabled: bool,
    /// Namespaces saved to and loaded from durable storage
    pub persistent_namespaces: BTreeSet<String>,
    /// When false the statistics counters stay frozen
    pub statistics_enabled: bool,
    /// The fixed namespace set
    pub namespaces: Vec<NamespaceConfig>,
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 100,
            default_ttl: Duration::from_secs(30 * MINUTE),
            cleanup_interval: Duration::from_secs(5 * MINUTE),
            compression_enabled: true,
            persistent_namespaces: ["configurations", "combinations"]
                .into_iter()
                .map(String::from)
                .collect(),
            statistics_enabled: true,
            namespaces: vec![
                NamespaceConfig::new("calculations", Some(Duration::from_secs(30 * MINUTE)), Some(100)),
                NamespaceConfig::new("configurations", Some(Duration::from_secs(24 * HOUR)), Some(50)),
                NamespaceConfig::new("combinations", Some(Duration::from_secs(HOUR)), Some(200)),
                NamespaceConfig::new("projections", Some(Duration::from_secs(15 * MINUTE)), Some(100)),
                NamespaceConfig::new("recommendations", Some(Duration::from_secs(10 * MINUTE)), Some(50)),
            ],
        }
    }
}

impl CacheConfig {
    /// Loads cache policy from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_CACHE_SIZE` - Default per-namespace cap (default: 100)
    /// - `DEFAULT_TTL_MS` - Fallback TTL in milliseconds (default: 30 minutes)
    /// - `CLEANUP_INTERVAL_MS` - Sweep period in milliseconds (default: 5 minutes)
    /// - `COMPRESSION_ENABLED` - `true`/`false` (default: true)
    /// - `STATISTICS_ENABLED` - `true`/`false` (default: true)
    /// - `PERSISTENT_NAMESPACES` - Comma-separated names (default: configurations,combinations)
    /// - `CACHE_NAMESPACES` - Comma-separated `name:ttl_ms:max_size` specs
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let namespaces = match env::var("CACHE_NAMESPACES") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .filter(|spec| !spec.trim().is_empty())
                .filter_map(|spec| {
                    let parsed = NamespaceConfig::parse(spec);
                    if parsed.is_none() {
                        warn!(spec, "Skipping malformed namespace spec");
                    }
                    parsed
                })
                .collect(),
            _ => defaults.namespaces,
        };

        let persistent_namespaces = match env::var("PERSISTENT_NAMESPACES") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => defaults.persistent_namespaces,
        };

        Self {
            max_cache_size: parse_var("MAX_CACHE_SIZE").unwrap_or(defaults.max_cache_size),
            default_ttl: parse_var("DEFAULT_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_ttl),
            cleanup_interval: parse_var("CLEANUP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cleanup_interval),
            compression_enabled: parse_flag("COMPRESSION_ENABLED")
                .unwrap_or(defaults.compression_enabled),
            persistent_namespaces,
            statistics_enabled: parse_flag("STATISTICS_ENABLED")
                .unwrap_or(defaults.statistics_enabled),
            namespaces,
        }
    }

    /// Resolves the effective `(ttl, max_size)` for a namespace entry.
    ///
    /// A capacity of zero is clamped to one so a `set` can always land.
    pub fn resolve(&self, namespace: &NamespaceConfig) -> (Duration, usize) {
        let ttl = namespace.ttl.unwrap_or(self.default_ttl);
        let max_size = namespace.max_size.unwrap_or(self.max_cache_size).max(1);
        (ttl, max_size)
    }
}

/// Server configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Directory for durable namespace snapshots; in-memory storage when unset
    pub storage_dir: Option<PathBuf>,
    /// Cache policy
    pub cache: CacheConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_STORAGE_DIR` - Snapshot directory (default: unset)
    /// - plus everything read by [`CacheConfig::from_env`]
    pub fn from_env() -> Self {
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(3000),
            storage_dir: env::var("CACHE_STORAGE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            cache: CacheConfig::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            storage_dir: None,
            cache: CacheConfig::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_flag(name: &str) -> Option<bool> {
    match env::var(name).ok()?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
