//! meactl - control panel for the BLDS
//!
//! # Usage
//!
//! ```bash
//! meactl --host localhost:12345
//! meactl --config config/meactl.toml --log-format json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use blds_client::{Connector, SimulatedServer};
use clap::Parser;
use eframe::egui;

use meactl::config::{MeactlConfig, DEFAULT_CONFIG_PATH};
use meactl::gui::{MeactlApp, WINDOW_TITLE};
use meactl::logging::{self, LoggingConfig, OutputFormat};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "meactl")]
#[command(about = "Control panel for the Baccus Lab Data Server", long_about = None)]
struct Cli {
    /// BLDS address, `host` or `host:port`
    #[arg(long)]
    host: Option<String>,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Minimum log level (overrides the configuration file)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format (overrides the configuration file)
    #[arg(long, value_enum)]
    log_format: Option<OutputFormat>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MeactlConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let mut logging_config = LoggingConfig::from_config(&config)?;
    if let Some(level) = &cli.log_level {
        logging_config = logging_config.with_level(logging::parse_log_level(level)?);
    }
    if let Some(format) = cli.log_format {
        logging_config = logging_config.with_format(format);
    }
    logging::init(logging_config)?;

    tracing::info!("Starting meactl");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("meactl-io")
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    // No network transport is shipped; sessions go to an in-process BLDS.
    let server = SimulatedServer::with_config(config.sim_config());
    let connector: Arc<dyn Connector> = Arc::new(server.connector());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 420.0])
            .with_min_inner_size([420.0, 360.0])
            .with_title(WINDOW_TITLE),
        ..Default::default()
    };

    let host = cli.host;
    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |cc| {
            Ok(Box::new(MeactlApp::new(
                cc, runtime, connector, &config, host,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}
