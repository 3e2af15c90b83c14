//! Configuration for the Akita WAIS CLI (spec.md §6).
//!
//! Mirrors the original implementation's shallow merge-over-defaults: any
//! section or key absent from the file falls back to [`Config::default`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration, one section per subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Mesh transport configuration.
    pub reticulum: ReticulumConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Identity key file paths.
    pub identity: IdentityConfig,
    /// Discovery aspect overrides.
    pub discovery: DiscoveryConfig,
    /// Server-role configuration.
    pub server: ServerConfig,
    /// Client-role configuration.
    pub client: ClientConfig,
}

/// Mesh transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReticulumConfig {
    /// Transport configuration directory; `None` means "use the transport's
    /// own default".
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
}

impl Default for ReticulumConfig {
    fn default() -> Self {
        Self { config_dir: None }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of DEBUG/INFO/WARNING/ERROR.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// Persistent identity key file paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Where the server's identity key is stored.
    #[serde(default = "default_server_identity_path")]
    pub server_identity_path: PathBuf,
    /// Where the client's identity key is stored.
    #[serde(default = "default_client_identity_path")]
    pub client_identity_path: PathBuf,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            server_identity_path: default_server_identity_path(),
            client_identity_path: default_client_identity_path(),
        }
    }
}

/// Discovery aspect overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Overrides the discovery aspect string.
    #[serde(default = "default_discovery_aspect")]
    pub aspect: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { aspect: default_discovery_aspect() }
    }
}

/// Server-role configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The canonical share root; created if missing.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Non-negative; 0 disables announcing.
    #[serde(default = "default_announce_interval_sec")]
    pub announce_interval_sec: u64,
    /// Advertised metadata.
    #[serde(default)]
    pub server_info: ServerInfo,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            announce_interval_sec: default_announce_interval_sec(),
            server_info: ServerInfo::default(),
        }
    }
}

/// Metadata advertised in announces and shown to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Display name.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Free-form search keywords (not currently surfaced on the wire).
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            description: String::new(),
            keywords: Vec::new(),
        }
    }
}

/// Client-role configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for link establishment and every request (seconds).
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
    /// Persisted `PeerCache` location.
    #[serde(default = "default_server_cache_path")]
    pub server_cache_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_sec: default_request_timeout_sec(),
            server_cache_path: default_server_cache_path(),
        }
    }
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn config_home() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join("akita-wais")
}

fn default_server_identity_path() -> PathBuf {
    config_home().join("server_identity")
}

fn default_client_identity_path() -> PathBuf {
    config_home().join("client_identity")
}

fn default_discovery_aspect() -> String {
    wais_core::protocol::DISCOVERY_ASPECT.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./share")
}

fn default_announce_interval_sec() -> u64 {
    60
}

fn default_server_name() -> String {
    "Akita WAIS Server".to_string()
}

fn default_request_timeout_sec() -> u64 {
    30
}

fn default_server_cache_path() -> PathBuf {
    config_home().join("server_cache.json")
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// The default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        config_home().join("config.toml")
    }

    /// Load from `path` if given, else the default path; if neither exists,
    /// write and return the built-in defaults (matches the original's
    /// load-or-create semantics).
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be parsed, or if writing
    /// a freshly created default fails.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Validate configuration invariants not already enforced by types.
    ///
    /// # Errors
    /// Returns an error describing the first invalid field found.
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_log_levels = ["DEBUG", "INFO", "WARNING", "ERROR"];
        if !valid_log_levels.contains(&self.logging.level.to_uppercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }
        if self.discovery.aspect.is_empty() {
            anyhow::bail!("discovery.aspect must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "VERBOSE".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trips() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.server.announce_interval_sec, deserialized.server.announce_interval_sec);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let partial = r#"
            [server]
            data_dir = "/tmp/shared"
        "#;
        let config: Config = toml::from_str(partial).unwrap();
        assert_eq!(config.server.data_dir, PathBuf::from("/tmp/shared"));
        assert_eq!(config.client.request_timeout_sec, default_request_timeout_sec());
    }
}
