/// Service configuration loader - parses explorer.toml
///
/// Keeps deployment settings (cache host, TTLs, search radii, file
/// locations) out of the code. Every field has a default, so a missing
/// file or section yields a working configuration. `MEMCACHED_HOST` and
/// `MEMCACHED_PORT` override the `[cache]` section after loading.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ExplorerError, ExplorerResult};

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "explorer.toml";

/// Longest accepted batch deadline.
pub const MAX_TASK_TIMEOUT_SECS: u64 = 3600;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// `[cache]`: distributed cache discovery and expiry
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Service name resolving to one address per cache node.
    pub host: String,
    pub port: u16,
    pub resync_interval_secs: u64,
    pub ttl_secs: u64,
    /// Connect/read/write timeout per cache call.
    pub io_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "memcached.default.svc.cluster.local".to_string(),
            port: 11211,
            resync_interval_secs: 10,
            ttl_secs: 3600,
            io_timeout_ms: 500,
        }
    }
}

impl CacheConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// `[search]`: radii offered for proximity search
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub radius_options_km: Vec<f64>,
    pub default_radius_km: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius_options_km: vec![50.0, 100.0, 150.0],
            default_radius_km: 100.0,
        }
    }
}

impl SearchConfig {
    /// The requested radius if it is one of the options, the default
    /// radius if none was requested.
    pub fn pick_radius(&self, requested: Option<f64>) -> ExplorerResult<f64> {
        match requested {
            None => Ok(self.default_radius_km),
            Some(r) if self.radius_options_km.contains(&r) => Ok(r),
            Some(r) => Err(ExplorerError::Config(format!(
                "radius {} km is not one of {:?}",
                r, self.radius_options_km
            ))),
        }
    }
}

/// `[catalog]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stations.toml"),
        }
    }
}

/// `[climate]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    pub path: PathBuf,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("climate_stations.toml"),
        }
    }
}

/// `[fanout]`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Batch deadline; unset waits for every station.
    pub task_timeout_secs: Option<u64>,
}

impl FanoutConfig {
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub catalog: CatalogConfig,
    pub climate: ClimateConfig,
    pub fanout: FanoutConfig,
    pub server: ServerConfig,
}

impl ServiceConfig {
    /// Reads `path`, applies environment overrides and validates.
    ///
    /// A missing file is not an error: defaults are used.
    pub fn load<P: AsRef<Path>>(path: P) -> ExplorerResult<Self> {
        let path = path.as_ref();
        dotenv::dotenv().ok();

        let mut config = match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(ExplorerError::Config(format!("failed to read {}: {}", path.display(), e)));
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> ExplorerResult<Self> {
        toml::from_str(contents).map_err(|e| ExplorerError::Config(format!("failed to parse config: {}", e)))
    }

    /// Applies `MEMCACHED_HOST` / `MEMCACHED_PORT` from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ExplorerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MEMCACHED_HOST").filter(|h| !h.trim().is_empty()) {
            self.cache.host = host.trim().to_string();
        }
        if let Some(port) = lookup("MEMCACHED_PORT") {
            self.cache.port = port
                .trim()
                .parse()
                .map_err(|_| ExplorerError::Config(format!("MEMCACHED_PORT '{}' is not a port number", port)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> ExplorerResult<()> {
        let search = &self.search;
        if search.radius_options_km.is_empty() {
            return Err(ExplorerError::Config("search.radius_options_km must not be empty".to_string()));
        }
        if let Some(bad) = search.radius_options_km.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            return Err(ExplorerError::Config(format!("search radius {} must be positive", bad)));
        }
        if !search.radius_options_km.contains(&search.default_radius_km) {
            return Err(ExplorerError::Config(format!(
                "search.default_radius_km {} is not one of {:?}",
                search.default_radius_km, search.radius_options_km
            )));
        }
        if self.cache.host.trim().is_empty() {
            return Err(ExplorerError::Config("cache.host must not be empty".to_string()));
        }
        if self.cache.io_timeout_ms == 0 {
            return Err(ExplorerError::Config("cache.io_timeout_ms must be positive".to_string()));
        }
        if let Some(secs) = self.fanout.task_timeout_secs {
            if !(1..=MAX_TASK_TIMEOUT_SECS).contains(&secs) {
                return Err(ExplorerError::Config(format!(
                    "fanout.task_timeout_secs {} must be within 1..={}",
                    secs, MAX_TASK_TIMEOUT_SECS
                )));
            }
        }
        Ok(())
    }
}
