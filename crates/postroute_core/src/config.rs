//! Environment-driven runtime configuration.
//!
//! Every value falls back to its default when the variable is absent or does
//! not parse. `from_lookup` exists so tests never touch the process env.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ROUTE_CACHE_TTL_SECS: u64 = 900;
const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_GEOCODER_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_GEOCODER_MIN_INTERVAL_MS: u64 = 1_000;
const DEFAULT_DB_PATH: &str = "postroute.sqlite3";

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, key: &str, default: &str) -> String {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn optional_string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        match (self.lookup)(key).map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if matches!(value.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(value) if matches!(value.as_str(), "0" | "false" | "no" | "off") => false,
            _ => default,
        }
    }

    fn u64(&self, key: &str, default: u64) -> u64 {
        (self.lookup)(key)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(default)
    }
}

/// Route cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_ROUTE_CACHE_TTL_SECS),
        }
    }
}

/// Route aggregation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateConfig {
    /// Collapse geometrically identical edges. Off by default: each edge is
    /// a distinct journey.
    pub dedupe_edges: bool,
}

/// Location directory settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Geocode once when `get_or_create` inserts a new place.
    pub geocode_on_create: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            geocode_on_create: true,
        }
    }
}

/// HTTP geocoder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Minimum delay between consecutive lookups.
    pub min_interval: Duration,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: default_user_agent(),
            request_timeout: Duration::from_millis(DEFAULT_GEOCODER_TIMEOUT_MS),
            min_interval: Duration::from_millis(DEFAULT_GEOCODER_MIN_INTERVAL_MS),
        }
    }
}

/// Logging bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// `None` logs to stderr.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Full core configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log: LogConfig,
    pub cache: CacheConfig,
    pub aggregate: AggregateConfig,
    pub directory: DirectoryConfig,
    pub geocoder: GeocoderConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log: LogConfig::default(),
            cache: CacheConfig::default(),
            aggregate: AggregateConfig::default(),
            directory: DirectoryConfig::default(),
            geocoder: GeocoderConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Reads `POSTROUTE_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = EnvReader { lookup };
        let defaults = Self::default();

        Self {
            db_path: PathBuf::from(env.string("POSTROUTE_DB_PATH", DEFAULT_DB_PATH)),
            log: LogConfig {
                level: env.string("POSTROUTE_LOG_LEVEL", &defaults.log.level),
                dir: env.optional_string("POSTROUTE_LOG_DIR").map(PathBuf::from),
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(
                    env.u64("POSTROUTE_ROUTE_CACHE_TTL_SECS", DEFAULT_ROUTE_CACHE_TTL_SECS),
                ),
            },
            aggregate: AggregateConfig {
                dedupe_edges: env.bool("POSTROUTE_DEDUPE_EDGES", false),
            },
            directory: DirectoryConfig {
                geocode_on_create: env.bool("POSTROUTE_GEOCODE_ON_CREATE", true),
            },
            geocoder: GeocoderConfig {
                base_url: env.string("POSTROUTE_GEOCODER_URL", DEFAULT_GEOCODER_URL),
                user_agent: env.string("POSTROUTE_GEOCODER_USER_AGENT", &default_user_agent()),
                request_timeout: Duration::from_millis(
                    env.u64("POSTROUTE_GEOCODER_TIMEOUT_MS", DEFAULT_GEOCODER_TIMEOUT_MS),
                ),
                min_interval: Duration::from_millis(env.u64(
                    "POSTROUTE_GEOCODER_MIN_INTERVAL_MS",
                    DEFAULT_GEOCODER_MIN_INTERVAL_MS,
                )),
            },
        }
    }
}

fn default_user_agent() -> String {
    format!("postroute/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::CoreConfig;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config_from(pairs: &[(&str, &str)]) -> CoreConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = config_from(&[]);
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.cache.ttl, Duration::from_secs(900));
        assert!(!config.aggregate.dedupe_edges);
        assert!(config.directory.geocode_on_create);
        assert!(config.log.dir.is_none());
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_from(&[
            ("POSTROUTE_ROUTE_CACHE_TTL_SECS", "300"),
            ("POSTROUTE_DEDUPE_EDGES", "yes"),
            ("POSTROUTE_GEOCODE_ON_CREATE", "off"),
            ("POSTROUTE_GEOCODER_MIN_INTERVAL_MS", "250"),
            ("POSTROUTE_LOG_DIR", "/var/log/postroute"),
            ("POSTROUTE_DB_PATH", "/data/archive.sqlite3"),
        ]);
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert!(config.aggregate.dedupe_edges);
        assert!(!config.directory.geocode_on_create);
        assert_eq!(config.geocoder.min_interval, Duration::from_millis(250));
        assert_eq!(config.log.dir, Some(PathBuf::from("/var/log/postroute")));
        assert_eq!(config.db_path, PathBuf::from("/data/archive.sqlite3"));
    }

    #[test]
    fn unparsable_values_fall_back() {
        let config = config_from(&[
            ("POSTROUTE_ROUTE_CACHE_TTL_SECS", "fifteen minutes"),
            ("POSTROUTE_DEDUPE_EDGES", "maybe"),
            ("POSTROUTE_LOG_DIR", "   "),
        ]);
        assert_eq!(config.cache.ttl, Duration::from_secs(900));
        assert!(!config.aggregate.dedupe_edges);
        assert!(config.log.dir.is_none());
    }
}
