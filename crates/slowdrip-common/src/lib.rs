use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Port every probe connects to. Not configurable.
pub const TARGET_PORT: u16 = 3333;

/// Host used when neither the config file nor `TARGET_IP` names one.
pub const DEFAULT_TARGET_HOST: &str = "127.0.0.1";

/// Environment variable overriding `target.host`.
pub const TARGET_IP_ENV: &str = "TARGET_IP";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub probe: ProbeConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    pub host: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TARGET_HOST.to_string(),
        }
    }
}

/// Per-session timing knobs. The pacing itself (jitter bound, post-send
/// pause, read size) is fixed by the probe and cannot be tuned here.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    pub connect_timeout_ms: u64,
    /// Upper bound on the single response read. `None` waits for the
    /// transport to deliver data, EOF or an error.
    pub read_timeout_ms: Option<u64>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            read_timeout_ms: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9464,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { json: true }
    }
}

impl Config {
    pub fn from_yaml_str(data: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(data).map_err(|source| ConfigError::Parse { source })
    }

    /// Loads `path` if it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&data)
    }

    /// Replaces the target host when an override is present and non-empty.
    pub fn with_target_host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.target.host = host.trim().to_string();
        }
        self
    }

    /// Applies `TARGET_IP` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        let host = std::env::var(TARGET_IP_ENV).ok();
        self.with_target_host(host)
    }

    pub fn target(&self) -> Target {
        Target::new(self.target.host.clone())
    }
}

/// Where probes connect. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: TARGET_PORT,
        }
    }

    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
