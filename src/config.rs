//! Configuration loading using Figment.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/meactl.toml` (or the file given with `--config`)
//! 3. Environment variables prefixed with `MEACTL_`, with `__` separating
//!    sections (`MEACTL_UI__STATUS_TIMEOUT_MS=3000`)
//!
//! # Example
//! ```no_run
//! use meactl::config::MeactlConfig;
//!
//! let config = MeactlConfig::load()?;
//! println!("Polling every {:?}", config.poll_interval());
//! # Ok::<(), meactl::error::MeactlError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppResult, MeactlError};
use crate::session::{MAX_RECORDING_LENGTH, MIN_RECORDING_LENGTH};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/meactl.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "MEACTL_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MeactlConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// BLDS connection settings
    pub server: ServerConfig,
    /// Recording defaults
    pub recording: RecordingConfig,
    /// Window and status bar settings
    pub ui: UiConfig,
    /// Simulated BLDS used when no networked client is linked in
    pub simulation: SimulationConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: "pretty".into(),
        }
    }
}

/// BLDS connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to connect to when none was persisted
    pub host: Option<String>,
    /// Interval between recording-status polls
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            poll_interval_ms: 1000,
        }
    }
}

/// Recording defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Recording length shown while disconnected, in seconds
    pub default_length: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            default_length: 1000,
        }
    }
}

/// UI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// How long status bar messages stay visible
    pub status_timeout_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            status_timeout_ms: 5000,
        }
    }
}

/// Simulated server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Hosts the simulated server answers on
    pub hosts: Vec<String>,
    /// Artificial latency per request
    pub latency_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".into(), "127.0.0.1".into()],
            latency_ms: 50,
        }
    }
}

impl MeactlConfig {
    /// Load configuration from the default file and environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(MeactlError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(MeactlError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        if self.server.poll_interval_ms == 0 {
            return Err(MeactlError::Configuration(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }

        if !(MIN_RECORDING_LENGTH..=MAX_RECORDING_LENGTH).contains(&self.recording.default_length)
        {
            return Err(MeactlError::Configuration(format!(
                "Invalid default_length {}. Must be {}-{}",
                self.recording.default_length, MIN_RECORDING_LENGTH, MAX_RECORDING_LENGTH
            )));
        }

        if self.simulation.hosts.is_empty() {
            return Err(MeactlError::Configuration(
                "simulation.hosts must list at least one host".into(),
            ));
        }

        Ok(())
    }

    /// Interval between recording-status polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.server.poll_interval_ms)
    }

    /// How long a status bar message stays visible.
    #[must_use]
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.ui.status_timeout_ms)
    }

    /// Simulated server settings in the form the client crate expects.
    #[must_use]
    pub fn sim_config(&self) -> blds_client::SimConfig {
        blds_client::SimConfig {
            hosts: self.simulation.hosts.clone(),
            latency: Duration::from_millis(self.simulation.latency_ms),
        }
    }
}
