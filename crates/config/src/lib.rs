use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "grapevine.toml",
    "config/grapevine.toml",
    "crates/config/grapevine.toml",
    "../grapevine.toml",
    "../config/grapevine.toml",
    "../crates/config/grapevine.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl HttpConfig {
    /// Bind address in `host:port` form for the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://grapevine.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Tuning for the comment change-feed worker that republishes CRUD writes
/// onto live post rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "BridgeConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "BridgeConfig::default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "BridgeConfig::default_batch_size")]
    pub batch_size: u32,
}

impl BridgeConfig {
    const fn default_poll_interval_ms() -> u64 {
        250
    }

    const fn default_retry_backoff_ms() -> u64 {
        2_000
    }

    const fn default_batch_size() -> u32 {
        64
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            retry_backoff_ms: Self::default_retry_backoff_ms(),
            batch_size: Self::default_batch_size(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use grapevine_config::load;
///
/// std::env::remove_var("GRAPEVINE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let db_max = defaults.database.max_connections as i64;

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())
        .unwrap()
        .set_default("http.port", i64::from(defaults.http.port))
        .unwrap()
        .set_default("database.url", defaults.database.url.clone())
        .unwrap()
        .set_default("database.max_connections", db_max)
        .unwrap()
        .set_default(
            "bridge.poll_interval_ms",
            i64::try_from(defaults.bridge.poll_interval_ms).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "bridge.retry_backoff_ms",
            i64::try_from(defaults.bridge.retry_backoff_ms).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default("bridge.batch_size", i64::from(defaults.bridge.batch_size))
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("GRAPEVINE").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("GRAPEVINE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via GRAPEVINE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
