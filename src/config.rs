//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::index::CompressionType;
use crate::transport::mux::SessionConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub builder: BuilderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Snapshot locations and encoding
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// JSON summary written next to the snapshot; not read by the server
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,

    #[serde(default)]
    pub compression: CompressionType,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("cleo"))
        .unwrap_or_else(|| PathBuf::from("./cleo_data"))
}

fn default_snapshot_path() -> PathBuf {
    default_data_dir().join("matchups.cleo")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            metadata_path: None,
            compression: CompressionType::default(),
        }
    }
}

/// Query server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve several sessions at once instead of one after another
    #[serde(default)]
    pub concurrent_sessions: bool,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Ping interval for idle connections; 0 disables keepalive
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,

    /// Silence tolerated past one keepalive interval before the connection is dropped
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    14002
}

fn default_max_frame_bytes() -> usize {
    64 * 1024 // 64 KB
}

fn default_keepalive_interval_ms() -> u64 {
    30_000
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            concurrent_sessions: false,
            max_frame_bytes: default_max_frame_bytes(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Multiplexer settings for each accepted connection
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            keepalive_interval: Some(Duration::from_millis(self.keepalive_interval_ms))
                .filter(|d| !d.is_zero()),
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            ..SessionConfig::default()
        }
    }
}

/// Index builder configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BuilderConfig {
    /// SQLite match store read by the packer
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Log progress every this many records
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,

    /// Skip matches with fewer teams than this
    #[serde(default = "default_min_teams")]
    pub min_teams: usize,
}

fn default_store_path() -> PathBuf {
    default_data_dir().join("matches.db")
}

fn default_progress_every() -> u64 {
    10_000
}

fn default_min_teams() -> usize {
    2
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            progress_every: default_progress_every(),
            min_teams: default_min_teams(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("cleo").join("config.toml")),
            Some(PathBuf::from("/etc/cleo/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Load `path` if given, otherwise search the default locations
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Index overrides
        if let Some(path) = var("CLEO_SNAPSHOT") {
            self.index.snapshot_path = PathBuf::from(path);
        }
        if let Some(path) = var("CLEO_METADATA") {
            self.index.metadata_path = Some(PathBuf::from(path));
        }

        // Server overrides
        if let Some(host) = var("CLEO_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("CLEO_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(flag) = var("CLEO_CONCURRENT_SESSIONS") {
            if let Ok(b) = flag.parse() {
                self.server.concurrent_sessions = b;
            }
        }

        // Builder overrides
        if let Some(path) = var("CLEO_STORE") {
            self.builder.store_path = PathBuf::from(path);
        }

        // Logging overrides
        if let Some(level) = var("CLEO_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("CLEO_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Cleo Configuration
#
# Environment variables override these settings:
# - CLEO_SNAPSHOT
# - CLEO_METADATA
# - CLEO_HOST
# - CLEO_PORT
# - CLEO_CONCURRENT_SESSIONS
# - CLEO_STORE
# - CLEO_LOG_LEVEL
# - CLEO_LOG_FORMAT

[index]
# Snapshot written by cleo-packer and served by cleo-server
snapshot_path = "~/.local/share/cleo/matchups.cleo"

# Optional JSON summary of the snapshot
# metadata_path = "~/.local/share/cleo/matchups.json"

# Snapshot body compression: lz4 or none
compression = "lz4"

[server]
# Address the query server listens on
host = "127.0.0.1"
port = 14002

# Serve several connections at once (default: one at a time)
concurrent_sessions = false

# Largest accepted request frame (bytes)
max_frame_bytes = 65536

# Ping idle connections this often (0 disables)
keepalive_interval_ms = 30000

# Drop a connection silent for one interval plus this long
connection_timeout_ms = 10000

[builder]
# SQLite match store
store_path = "~/.local/share/cleo/matches.db"

# Log progress every N records
progress_every = 10000

# Skip matches with fewer teams
min_teams = 2

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
