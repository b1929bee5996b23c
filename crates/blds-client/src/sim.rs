//! In-process simulated BLDS.
//!
//! Provides a server that behaves like the real one at the level the
//! control panel observes: sources, timed recordings that finish on their
//! own, per-source acquisition parameters and server-supplied rejection
//! messages. Several sessions can share one server, which is how the main
//! panel and the settings window see each other's changes.
//!
//! All waiting uses `tokio::time`, so tests can run with a paused clock.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{sleep, Duration, Instant};

use crate::client::{BldsClient, Connector};
use crate::connection::ServerAddress;
use crate::error::{ClientError, Result};
use crate::params::{ParamValue, ServerParam, SourceParam, SourceType, Trigger};
use crate::status::{ServerStatus, SourceStatus};

/// Longest recording the server accepts, in seconds.
pub const MAX_RECORDING_LENGTH: u32 = 50_000;

/// Behaviour of the simulated server.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Hostnames that accept connections; anything else is unreachable.
    pub hosts: Vec<String>,
    /// Delay applied to every request and to connecting.
    pub latency: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".into(), "127.0.0.1".into()],
            latency: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone)]
struct SimSource {
    source_type: SourceType,
    location: String,
    adc_range: f64,
    trigger: Trigger,
    plug: u32,
    configuration_file: Option<String>,
    analog_output: Vec<f64>,
}

impl SimSource {
    fn new(source_type: SourceType, location: &str) -> Self {
        Self {
            source_type,
            location: location.to_string(),
            adc_range: 0.2,
            trigger: Trigger::None,
            plug: 0,
            configuration_file: None,
            analog_output: Vec::new(),
        }
    }

    fn supports(&self, param: SourceParam) -> bool {
        match param {
            SourceParam::AdcRange | SourceParam::Trigger | SourceParam::AnalogOutput => true,
            SourceParam::Plug | SourceParam::ConfigurationFile => {
                self.source_type == SourceType::Hidens
            }
        }
    }
}

#[derive(Debug, Clone)]
struct SimRecording {
    started: Instant,
    length: u32,
    file: String,
}

impl SimRecording {
    fn position(&self, now: Instant) -> f64 {
        now.duration_since(self.started)
            .as_secs_f64()
            .min(f64::from(self.length))
    }

    fn finished(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= Duration::from_secs(u64::from(self.length))
    }
}

#[derive(Debug)]
struct ServerState {
    running: bool,
    source: Option<SimSource>,
    recording: Option<SimRecording>,
    recording_length: u32,
    save_directory: String,
    /// File chosen explicitly by a client for the next recording
    requested_file: Option<String>,
    /// File the server will use if no client picks one
    default_file: String,
}

impl ServerState {
    fn new() -> Self {
        Self {
            running: true,
            source: None,
            recording: None,
            recording_length: 1000,
            save_directory: std::env::temp_dir().display().to_string(),
            requested_file: None,
            default_file: generated_filename(),
        }
    }

    /// Retire a recording whose length has elapsed.
    fn refresh(&mut self, now: Instant) {
        if self.recording.as_ref().is_some_and(|r| r.finished(now)) {
            tracing::debug!("Simulated recording reached its length");
            self.finish_recording();
        }
    }

    fn finish_recording(&mut self) {
        self.recording = None;
        self.requested_file = None;
        self.default_file = generated_filename();
    }

    fn current_file(&self) -> String {
        match (&self.recording, &self.requested_file) {
            (Some(rec), _) => rec.file.clone(),
            (None, Some(file)) => file.clone(),
            (None, None) => self.default_file.clone(),
        }
    }

    fn source(&self) -> Result<&SimSource> {
        self.source
            .as_ref()
            .ok_or_else(|| ClientError::Rejected("There is no data source".into()))
    }
}

fn generated_filename() -> String {
    format!("{}.h5", chrono::Local::now().format("%Y-%m-%dT%H-%M-%S"))
}

/// A simulated BLDS shared by any number of sessions.
#[derive(Clone)]
pub struct SimulatedServer {
    state: Arc<RwLock<ServerState>>,
    errors: broadcast::Sender<String>,
    config: SimConfig,
}

impl SimulatedServer {
    /// Create a server with default behaviour.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a server with custom hosts and latency.
    pub fn with_config(config: SimConfig) -> Self {
        let (errors, _) = broadcast::channel(8);
        Self {
            state: Arc::new(RwLock::new(ServerState::new())),
            errors,
            config,
        }
    }

    /// A connector whose sessions talk to this server.
    #[must_use]
    pub fn connector(&self) -> SimulatedConnector {
        SimulatedConnector {
            server: self.clone(),
        }
    }

    /// Stop the current recording as another client would.
    pub async fn end_recording(&self) {
        let mut state = self.state.write().await;
        if state.recording.is_some() {
            state.finish_recording();
        }
    }

    /// Remove the source (and any recording) as another client would.
    pub async fn remove_source(&self) {
        let mut state = self.state.write().await;
        if state.recording.is_some() {
            state.finish_recording();
        }
        state.source = None;
    }

    /// Simulate the server going away; every session receives `reason` on
    /// its error channel and later requests fail with a transport error.
    pub async fn shutdown(&self, reason: &str) {
        self.state.write().await.running = false;
        tracing::info!("Simulated BLDS shutting down: {}", reason);
        let _ = self.errors.send(reason.to_string());
    }

    /// Current server status, without latency.
    pub async fn status(&self) -> ServerStatus {
        let mut state = self.state.write().await;
        state.refresh(Instant::now());
        server_status(&state)
    }

    async fn create_source(&self, source_type: SourceType, location: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.refresh(Instant::now());
        if state.source.is_some() {
            return Err(ClientError::Rejected("A data source already exists".into()));
        }
        if source_type.takes_location() && location.trim().is_empty() {
            return Err(ClientError::Rejected(format!(
                "A location is required to create a {source_type} source"
            )));
        }
        state.source = Some(SimSource::new(source_type, location));
        tracing::info!("Simulated BLDS created {} source at '{}'", source_type, location);
        Ok(())
    }

    async fn delete_source(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.refresh(Instant::now());
        if state.source.is_none() {
            return Err(ClientError::Rejected("There is no data source to delete".into()));
        }
        if state.recording.is_some() {
            return Err(ClientError::Rejected(
                "Cannot delete the data source while a recording is active".into(),
            ));
        }
        state.source = None;
        Ok(())
    }

    async fn start_recording(&self) -> Result<()> {
        let now = Instant::now();
        let mut state = self.state.write().await;
        state.refresh(now);
        if state.source.is_none() {
            return Err(ClientError::Rejected(
                "Cannot start a recording without a data source".into(),
            ));
        }
        if state.recording.is_some() {
            return Err(ClientError::Rejected("A recording is already in progress".into()));
        }
        let file = state.current_file();
        state.recording = Some(SimRecording {
            started: now,
            length: state.recording_length,
            file,
        });
        Ok(())
    }

    async fn stop_recording(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.refresh(Instant::now());
        if state.recording.is_none() {
            return Err(ClientError::Rejected("No recording is in progress".into()));
        }
        state.finish_recording();
        Ok(())
    }

    async fn get(&self, param: ServerParam) -> Result<ParamValue> {
        let now = Instant::now();
        let mut state = self.state.write().await;
        state.refresh(now);
        let value = match param {
            ServerParam::RecordingLength => ParamValue::from(state.recording_length),
            ServerParam::SaveFile => ParamValue::Text(state.current_file()),
            ServerParam::SaveDirectory => ParamValue::Text(state.save_directory.clone()),
            ServerParam::RecordingExists => ParamValue::Bool(state.recording.is_some()),
            ServerParam::RecordingPosition => ParamValue::Float(
                state.recording.as_ref().map_or(0.0, |r| r.position(now)),
            ),
            ServerParam::SourceExists => ParamValue::Bool(state.source.is_some()),
        };
        Ok(value)
    }

    async fn set(&self, param: ServerParam, value: ParamValue) -> Result<()> {
        // Check the directory before taking the lock.
        if param == ServerParam::SaveDirectory {
            let dir = value.as_text().map_err(reject)?;
            let is_dir = tokio::fs::metadata(dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Err(ClientError::Rejected(format!("'{dir}' is not a directory")));
            }
        }

        let mut state = self.state.write().await;
        state.refresh(Instant::now());
        if state.recording.is_some() && param != ServerParam::SaveDirectory {
            return Err(ClientError::Rejected(format!(
                "Cannot change '{param}' while a recording is active"
            )));
        }

        match param {
            ServerParam::RecordingLength => {
                let length = value.as_int().map_err(reject)?;
                let length = u32::try_from(length)
                    .ok()
                    .filter(|l| (1..=MAX_RECORDING_LENGTH).contains(l))
                    .ok_or_else(|| {
                        ClientError::Rejected(format!(
                            "Recording length must be between 1 and {MAX_RECORDING_LENGTH} seconds"
                        ))
                    })?;
                state.recording_length = length;
            }
            ServerParam::SaveFile => {
                let file = value.as_text().map_err(reject)?.trim().to_string();
                if file.is_empty() {
                    return Err(ClientError::Rejected("The filename cannot be empty".into()));
                }
                state.requested_file = Some(file);
            }
            ServerParam::SaveDirectory => {
                state.save_directory = value.as_text().map_err(reject)?.to_string();
            }
            ServerParam::RecordingExists
            | ServerParam::RecordingPosition
            | ServerParam::SourceExists => {
                return Err(ClientError::Rejected(format!("Parameter '{param}' is read-only")));
            }
        }
        Ok(())
    }

    async fn get_source(&self, param: SourceParam) -> Result<ParamValue> {
        let mut state = self.state.write().await;
        state.refresh(Instant::now());
        let source = state.source()?;
        if !source.supports(param) {
            return Err(unsupported(source, param));
        }
        let value = match param {
            SourceParam::AdcRange => ParamValue::Float(source.adc_range),
            SourceParam::Trigger => ParamValue::from(source.trigger.as_str()),
            SourceParam::Plug => ParamValue::from(source.plug),
            SourceParam::ConfigurationFile => {
                ParamValue::Text(source.configuration_file.clone().unwrap_or_default())
            }
            SourceParam::AnalogOutput => ParamValue::Samples(source.analog_output.clone()),
        };
        Ok(value)
    }

    async fn set_source(&self, param: SourceParam, value: ParamValue) -> Result<()> {
        let mut state = self.state.write().await;
        state.refresh(Instant::now());
        let recording = state.recording.is_some();
        let source = state
            .source
            .as_mut()
            .ok_or_else(|| ClientError::Rejected("There is no data source".into()))?;
        if !source.supports(param) {
            return Err(unsupported(source, param));
        }

        match param {
            SourceParam::AdcRange => {
                let range = value.as_f64().map_err(reject)?;
                if !(0.001..=10.0).contains(&range) {
                    return Err(ClientError::Rejected(
                        "The ADC range must be between 0.001 and 10 V".into(),
                    ));
                }
                source.adc_range = range;
            }
            SourceParam::Trigger => {
                source.trigger = value.as_text().map_err(reject)?.parse()?;
            }
            SourceParam::Plug => {
                let plug = value.as_int().map_err(reject)?;
                if !(0..=4).contains(&plug) {
                    return Err(ClientError::Rejected(format!("Invalid plug number {plug}")));
                }
                source.plug = plug as u32;
            }
            SourceParam::ConfigurationFile => {
                let file = value.as_text().map_err(reject)?;
                if file.is_empty() {
                    return Err(ClientError::Rejected(
                        "A configuration file must be given".into(),
                    ));
                }
                source.configuration_file = Some(file.to_string());
            }
            SourceParam::AnalogOutput => {
                if recording {
                    return Err(ClientError::Rejected(
                        "Cannot change the analog output while a recording is active".into(),
                    ));
                }
                source.analog_output = value.as_samples().map_err(reject)?.to_vec();
            }
        }
        Ok(())
    }

    async fn source_status(&self) -> Result<SourceStatus> {
        let mut state = self.state.write().await;
        state.refresh(Instant::now());
        let value = match &state.source {
            None => json!({ "exists": false }),
            Some(source) => {
                let mut obj = json!({
                    "exists": true,
                    "source-type": source.source_type,
                    "location": source.location,
                    "adc-range": source.adc_range,
                    "trigger": source.trigger,
                    "has-analog-output": !source.analog_output.is_empty(),
                });
                if source.supports(SourceParam::Plug) {
                    obj["plug"] = json!(source.plug);
                }
                if let Some(config) = &source.configuration_file {
                    obj["configuration-file"] = json!(config);
                }
                obj
            }
        };
        SourceStatus::from_json(value)
    }

    async fn check_running(&self) -> Result<()> {
        if self.state.read().await.running {
            Ok(())
        } else {
            Err(ClientError::Transport("connection closed by server".into()))
        }
    }
}

impl Default for SimulatedServer {
    fn default() -> Self {
        Self::new()
    }
}

fn server_status(state: &ServerState) -> ServerStatus {
    let now = Instant::now();
    let value = json!({
        "source-exists": state.source.is_some(),
        "source-type": state.source.as_ref().map(|s| s.source_type),
        "source-location": state.source.as_ref().map(|s| s.location.clone()).unwrap_or_default(),
        "recording-exists": state.recording.is_some(),
        "recording-length": state.recording.as_ref().map_or(state.recording_length, |r| r.length),
        "recording-position": state.recording.as_ref().map_or(0.0, |r| r.position(now)),
        "save-file": state.current_file(),
        "save-directory": state.save_directory,
    });
    // The status is built from well-typed fields; a failure here is a bug.
    ServerStatus::from_json(value).unwrap_or_default()
}

fn reject(err: ClientError) -> ClientError {
    ClientError::Rejected(format!("Invalid value: {err}"))
}

fn unsupported(source: &SimSource, param: SourceParam) -> ClientError {
    ClientError::Rejected(format!(
        "Parameter '{param}' is not supported by {} sources",
        source.source_type
    ))
}

/// Connector producing sessions against a [`SimulatedServer`].
#[derive(Clone)]
pub struct SimulatedConnector {
    server: SimulatedServer,
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(&self, address: &ServerAddress) -> Result<Arc<dyn BldsClient>> {
        sleep(self.server.config.latency).await;

        if !self.server.config.hosts.iter().any(|h| h == address.host()) {
            return Err(ClientError::Connection(format!(
                "could not reach the BLDS at {address}"
            )));
        }
        if !self.server.state.read().await.running {
            return Err(ClientError::Connection(format!(
                "connection refused by {address}"
            )));
        }

        tracing::debug!("Simulated session opened to {}", address);
        Ok(Arc::new(SimulatedClient {
            address: address.clone(),
            server: self.server.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A session against a [`SimulatedServer`].
pub struct SimulatedClient {
    address: ServerAddress,
    server: SimulatedServer,
    closed: AtomicBool,
}

impl SimulatedClient {
    async fn roundtrip(&self) -> Result<()> {
        sleep(self.server.config.latency).await;
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Disconnected);
        }
        self.server.check_running().await
    }
}

#[async_trait]
impl BldsClient for SimulatedClient {
    fn address(&self) -> &ServerAddress {
        &self.address
    }

    async fn disconnect(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        tracing::debug!("Simulated session to {} closed", self.address);
        Ok(())
    }

    async fn create_source(&self, source_type: SourceType, location: &str) -> Result<()> {
        self.roundtrip().await?;
        self.server.create_source(source_type, location).await
    }

    async fn delete_source(&self) -> Result<()> {
        self.roundtrip().await?;
        self.server.delete_source().await
    }

    async fn start_recording(&self) -> Result<()> {
        self.roundtrip().await?;
        self.server.start_recording().await
    }

    async fn stop_recording(&self) -> Result<()> {
        self.roundtrip().await?;
        self.server.stop_recording().await
    }

    async fn get(&self, param: ServerParam) -> Result<ParamValue> {
        self.roundtrip().await?;
        self.server.get(param).await
    }

    async fn set(&self, param: ServerParam, value: ParamValue) -> Result<()> {
        self.roundtrip().await?;
        self.server.set(param, value).await
    }

    async fn get_source(&self, param: SourceParam) -> Result<ParamValue> {
        self.roundtrip().await?;
        self.server.get_source(param).await
    }

    async fn set_source(&self, param: SourceParam, value: ParamValue) -> Result<()> {
        self.roundtrip().await?;
        self.server.set_source(param, value).await
    }

    async fn server_status(&self) -> Result<ServerStatus> {
        self.roundtrip().await?;
        Ok(self.server.status().await)
    }

    async fn source_status(&self) -> Result<SourceStatus> {
        self.roundtrip().await?;
        self.server.source_status().await
    }

    fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.server.errors.subscribe()
    }
}
