//! Tracing initialisation.
//!
//! Sets up a `tracing-subscriber` registry with an `EnvFilter` and one of
//! three output formats. `RUST_LOG` overrides the configured level.
//!
//! ```no_run
//! use meactl::{config::MeactlConfig, logging};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MeactlConfig::load()?;
//! logging::init_from_config(&config)?;
//! tracing::info!("meactl started");
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::MeactlConfig;
use crate::error::{AppResult, MeactlError};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Multi-line, coloured (development)
    #[default]
    Pretty,
    /// Single-line, no colour
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for OutputFormat {
    type Err = MeactlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(MeactlError::Configuration(format!(
                "Invalid log format '{other}'. Must be one of: pretty, compact, json"
            ))),
        }
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Include source file and line
    pub with_file_and_line: bool,
    /// Include thread names
    pub with_thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Pretty,
            with_file_and_line: true,
            with_thread_names: true,
        }
    }
}

impl LoggingConfig {
    /// Build logging options from the application configuration.
    pub fn from_config(config: &MeactlConfig) -> AppResult<Self> {
        Ok(Self {
            level: parse_log_level(&config.application.log_level)?,
            format: config.application.log_format.parse()?,
            ..Default::default()
        })
    }

    /// Set output format
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the minimum level
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

/// Initialise logging from the application configuration.
pub fn init_from_config(config: &MeactlConfig) -> AppResult<()> {
    init(LoggingConfig::from_config(config)?)
}

/// Initialise logging.
///
/// Idempotent: if a global subscriber is already installed this returns
/// `Ok(())`, so tests and embedding applications can call it freely.
pub fn init(config: LoggingConfig) -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let layer = match config.format {
        OutputFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .boxed(),
        OutputFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(false)
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .boxed(),
        OutputFormat::Json => fmt::layer()
            .json()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .boxed(),
    };

    match tracing_subscriber::registry()
        .with(layer.with_filter(env_filter))
        .try_init()
    {
        Ok(()) => Ok(()),
        // Already initialised, expected in tests
        Err(e) if e.to_string().contains("global default trace dispatcher") => Ok(()),
        Err(e) => Err(MeactlError::Logging(format!(
            "Failed to initialize tracing: {e}"
        ))),
    }
}

/// Parse a log level name, case-insensitively.
pub fn parse_log_level(level: &str) -> AppResult<Level> {
    Level::from_str(level).map_err(|_| {
        MeactlError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))
    })
}
