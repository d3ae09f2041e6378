//! Monitor configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via HEOS_CONFIG)
//! 3. Environment variables

use heos_client::{ConnectionConfig, DiscoveryOptions, Endpoint};
use heos_protocol::{DEFAULT_MAX_MESSAGE_SIZE, HEOS_PORT};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Monitor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device to connect to.
    pub device: DeviceConfig,
    /// Discovery, used when no host is configured.
    pub discovery: DiscoveryConfig,
    /// Monitor behaviour.
    pub monitor: MonitorConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("HEOS_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides looked up by variable name.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        self.device.apply_overrides(&var);
        self.discovery.apply_overrides(&var);
        self.monitor.apply_overrides(&var);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.port == 0 {
            return Err(ConfigError::ValidationError(
                "device.port must not be 0".to_string(),
            ));
        }
        if self.device.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "device.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.discovery.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "discovery.timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Connection settings for `endpoint`.
    pub fn connection_config(&self, endpoint: Endpoint) -> ConnectionConfig {
        ConnectionConfig::new(endpoint.with_port(self.device.port))
            .with_connect_timeout(Duration::from_secs(self.device.connect_timeout_secs))
            .with_processing_timeout(self.device.processing_timeout())
            .with_max_message_size(self.device.max_message_size)
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions::new()
            .with_max_devices(self.discovery.max_devices)
            .with_timeout(Duration::from_millis(self.discovery.timeout_ms))
    }
}

/// Device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device address; discovered when unset.
    pub host: Option<IpAddr>,
    pub port: u16,
    /// Timeout for opening each channel, in seconds.
    pub connect_timeout_secs: u64,
    /// How long a command may keep reporting "command under process", in
    /// seconds. 0 waits forever.
    pub processing_timeout_secs: u64,
    /// Largest accepted command channel message in bytes.
    pub max_message_size: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: HEOS_PORT,
            connect_timeout_secs: 10,
            processing_timeout_secs: 60,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl DeviceConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("HEOS_HOST") {
            if let Ok(parsed) = host.parse() {
                self.host = Some(parsed);
            }
        }

        if let Some(port) = var("HEOS_PORT") {
            if let Ok(parsed) = port.parse() {
                self.port = parsed;
            }
        }

        if let Some(timeout) = var("HEOS_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.connect_timeout_secs = secs;
            }
        }

        if let Some(timeout) = var("HEOS_PROCESSING_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.processing_timeout_secs = secs;
            }
        }
    }

    pub fn processing_timeout(&self) -> Option<Duration> {
        match self.processing_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How long to wait for responses, in milliseconds.
    pub timeout_ms: u64,
    /// Stop after this many devices (0 = wait for the full timeout).
    pub max_devices: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_devices: 1,
        }
    }
}

impl DiscoveryConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(timeout) = var("HEOS_DISCOVERY_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.timeout_ms = ms;
            }
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Heartbeat interval in seconds (0 = disabled).
    pub heartbeat_secs: u64,
    /// Register for change events after connecting.
    pub register_events: bool,
    /// Log events as pretty-printed JSON.
    pub pretty: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 30,
            register_events: true,
            pretty: false,
        }
    }
}

impl MonitorConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(interval) = var("HEOS_HEARTBEAT_SECS") {
            if let Ok(secs) = interval.parse() {
                self.heartbeat_secs = secs;
            }
        }
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        match self.heartbeat_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.host, None);
        assert_eq!(config.device.port, 1255);
        assert_eq!(config.device.processing_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.discovery.timeout_ms, 5000);
        assert_eq!(config.discovery.max_devices, 1);
        assert_eq!(config.monitor.heartbeat_interval(), Some(Duration::from_secs(30)));
        assert!(config.monitor.register_events);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "device:\n  host: 192.168.1.40\n  processing_timeout_secs: 0\nmonitor:\n  heartbeat_secs: 0\n  pretty: true"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.device.host, Some("192.168.1.40".parse().unwrap()));
        assert_eq!(config.device.port, 1255);
        assert_eq!(config.device.processing_timeout(), None);
        assert_eq!(config.monitor.heartbeat_interval(), None);
        assert!(config.monitor.pretty);
        assert!(config.monitor.register_events);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::IoError(_, _))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "device: [not, a, map]").unwrap();
        assert!(matches!(
            Config::from_file(&bad),
            Err(ConfigError::ParseError(_, _))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heos.yaml");

        let mut config = Config::default();
        config.device.host = Some("10.0.0.2".parse().unwrap());
        config.discovery.max_devices = 3;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.device.host, config.device.host);
        assert_eq!(loaded.discovery.max_devices, 3);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HEOS_HOST", "10.1.1.1"),
            ("HEOS_PORT", "4000"),
            ("HEOS_CONNECT_TIMEOUT_SECS", "3"),
            ("HEOS_HEARTBEAT_SECS", "5"),
            ("HEOS_DISCOVERY_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.device.host, Some("10.1.1.1".parse().unwrap()));
        assert_eq!(config.device.port, 4000);
        assert_eq!(config.device.connect_timeout_secs, 3);
        assert_eq!(config.monitor.heartbeat_secs, 5);
        // Unparseable values are ignored.
        assert_eq!(config.discovery.timeout_ms, 5000);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.device.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_connection_config() {
        let mut config = Config::default();
        config.device.port = 5000;
        config.device.processing_timeout_secs = 0;

        let endpoint = Endpoint::new("192.168.1.5".parse().unwrap());
        let connection = config.connection_config(endpoint);
        assert_eq!(connection.endpoint.port, 5000);
        assert_eq!(connection.processing_timeout, None);
        assert_eq!(connection.connect_timeout, Duration::from_secs(10));
    }
}
