//! Acquisition settings for the current data source.
//!
//! The settings window talks to the BLDS over its own session, separate from
//! the main panel's. Each field is edited independently: the new value is
//! shown at once, the request goes out, and on failure the previous value
//! comes back together with a warning. At most one request per parameter is
//! outstanding.
//!
//! The two sessions are not coordinated. If the main panel deletes the
//! source while this window is open, later edits here fail with the
//! server's message and are rolled back.

use std::path::PathBuf;
use std::sync::Arc;

use blds_client::{
    BldsClient, ClientError, Connector, ParamValue, ServerAddress, SourceParam, SourceStatus,
    SourceType, Trigger,
};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::analog_output::{read_analog_output, AnalogOutputError, HDF5_ENABLED};
use crate::session::{Dialog, Notification, PendingTable, RequestId};

/// Smallest ADC range in volts.
pub const MIN_ADC_RANGE: f64 = 0.001;
/// Largest ADC range in volts.
pub const MAX_ADC_RANGE: f64 = 10.0;
/// Highest plug number.
pub const MAX_PLUG: u32 = 4;
/// Extensions of chip configuration files (`*.cmdraw.nrk2`, `*.cmdraw`).
pub const CONFIGURATION_EXTENSIONS: [&str; 2] = ["nrk2", "cmdraw"];

/// Lifecycle of the settings window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Connecting,
    /// Connected, waiting for the source status
    Loading,
    Ready,
    Closed,
}

/// What the panel knows about the source's analog-output waveform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AnalogOutputState {
    #[default]
    None,
    /// Loaded by another client; the file is not known here
    Unknown,
    Loaded { file: String, samples: usize },
}

impl AnalogOutputState {
    /// Text for the analog-output field.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Unknown => "Unknown analog output file".into(),
            Self::Loaded { file, samples } => format!("{file} ({samples} samples)"),
        }
    }
}

/// Acquisition parameters shown in the window.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionParams {
    /// ADC range in volts
    pub adc_range: f64,
    pub trigger: Trigger,
    /// `None` when the source has no plug selector
    pub plug: Option<u32>,
    /// `None` when the source takes no configuration, or none was loaded
    pub configuration_file: Option<String>,
    pub analog_output: AnalogOutputState,
}

impl Default for AcquisitionParams {
    fn default() -> Self {
        Self {
            adc_range: 0.2,
            trigger: Trigger::None,
            plug: None,
            configuration_file: None,
            analog_output: AnalogOutputState::None,
        }
    }
}

impl AcquisitionParams {
    /// Parameters as reported by the server.
    #[must_use]
    pub fn from_status(status: &SourceStatus) -> Self {
        let defaults = Self::default();
        Self {
            adc_range: status.adc_range.unwrap_or(defaults.adc_range),
            trigger: status.trigger.unwrap_or(defaults.trigger),
            plug: status.plug,
            configuration_file: status.configuration_file.clone(),
            analog_output: if status.has_analog_output {
                AnalogOutputState::Unknown
            } else {
                AnalogOutputState::None
            },
        }
    }

    /// Current value of one field.
    #[must_use]
    pub fn field(&self, param: SourceParam) -> AcquisitionField {
        match param {
            SourceParam::AdcRange => AcquisitionField::AdcRange(self.adc_range),
            SourceParam::Trigger => AcquisitionField::Trigger(self.trigger),
            SourceParam::Plug => AcquisitionField::Plug(self.plug),
            SourceParam::ConfigurationFile => {
                AcquisitionField::ConfigurationFile(self.configuration_file.clone())
            }
            SourceParam::AnalogOutput => {
                AcquisitionField::AnalogOutput(self.analog_output.clone())
            }
        }
    }

    /// Overwrite one field.
    pub fn apply(&mut self, field: AcquisitionField) {
        match field {
            AcquisitionField::AdcRange(range) => self.adc_range = range,
            AcquisitionField::Trigger(trigger) => self.trigger = trigger,
            AcquisitionField::Plug(plug) => self.plug = plug,
            AcquisitionField::ConfigurationFile(file) => self.configuration_file = file,
            AcquisitionField::AnalogOutput(state) => self.analog_output = state,
        }
    }
}

/// A value for one acquisition parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionField {
    AdcRange(f64),
    Trigger(Trigger),
    Plug(Option<u32>),
    ConfigurationFile(Option<String>),
    AnalogOutput(AnalogOutputState),
}

impl AcquisitionField {
    /// The source parameter this value belongs to.
    #[must_use]
    pub fn param(&self) -> SourceParam {
        match self {
            Self::AdcRange(_) => SourceParam::AdcRange,
            Self::Trigger(_) => SourceParam::Trigger,
            Self::Plug(_) => SourceParam::Plug,
            Self::ConfigurationFile(_) => SourceParam::ConfigurationFile,
            Self::AnalogOutput(_) => SourceParam::AnalogOutput,
        }
    }

    fn notification(&self) -> Option<Notification> {
        match self {
            Self::AdcRange(range) => Some(Notification::AdcRangeChanged(*range)),
            Self::Trigger(trigger) => Some(Notification::TriggerSet(*trigger)),
            Self::Plug(plug) => plug.map(Notification::PlugSet),
            Self::ConfigurationFile(file) => file.clone().map(Notification::ConfigurationRead),
            Self::AnalogOutput(AnalogOutputState::Loaded { file, .. }) => {
                Some(Notification::AnalogOutputRead(file.clone()))
            }
            Self::AnalogOutput(_) => Some(Notification::AnalogOutputCleared),
        }
    }
}

enum PanelOutcome {
    Connected(Result<Arc<dyn BldsClient>, ClientError>),
    Status(Result<SourceStatus, ClientError>),
    FileRead {
        file: String,
        result: Result<Vec<f64>, AnalogOutputError>,
    },
    Set {
        field: AcquisitionField,
        id: RequestId,
        result: Result<(), ClientError>,
    },
    SessionError(String),
}

/// The acquisition settings window's model.
pub struct SourceSettingsPanel {
    runtime: Handle,
    address: ServerAddress,
    client: Option<Arc<dyn BldsClient>>,
    state: PanelState,
    source_type: Option<SourceType>,
    params: AcquisitionParams,
    pending: PendingTable<SourceParam, AcquisitionField>,
    reading_file: bool,
    tx: mpsc::Sender<PanelOutcome>,
    rx: mpsc::Receiver<PanelOutcome>,
    cancel_connect: Option<oneshot::Sender<()>>,
    error_watch: Option<JoinHandle<()>>,
    notifications: Vec<Notification>,
    dialogs: Vec<Dialog>,
}

impl SourceSettingsPanel {
    /// Open a window with its own session to `address`.
    pub fn open(runtime: Handle, connector: Arc<dyn Connector>, address: ServerAddress) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let connect_tx = tx.clone();
        let connect_address = address.clone();
        runtime.spawn(async move {
            tokio::select! {
                result = connector.connect(&connect_address) => {
                    let _ = connect_tx.send(PanelOutcome::Connected(result)).await;
                }
                _ = cancel_rx => {}
            }
        });
        tracing::info!("Opening source settings session to {}", address);

        Self {
            runtime,
            address,
            client: None,
            state: PanelState::Connecting,
            source_type: None,
            params: AcquisitionParams::default(),
            pending: PendingTable::new(),
            reading_file: false,
            tx,
            rx,
            cancel_connect: Some(cancel_tx),
            error_watch: None,
            notifications: Vec::new(),
            dialogs: Vec::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PanelState {
        self.state
    }

    /// Whether the window should still be shown.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state != PanelState::Closed
    }

    /// Parameters as currently displayed.
    #[must_use]
    pub fn params(&self) -> &AcquisitionParams {
        &self.params
    }

    /// Type of the source being configured, once known.
    #[must_use]
    pub fn source_type(&self) -> Option<SourceType> {
        self.source_type
    }

    /// Whether `param` can be edited right now.
    #[must_use]
    pub fn can_edit(&self, param: SourceParam) -> bool {
        if self.state != PanelState::Ready || self.pending.is_pending(param) {
            return false;
        }
        match param {
            SourceParam::Plug | SourceParam::ConfigurationFile => {
                self.source_type == Some(SourceType::Hidens)
            }
            SourceParam::AnalogOutput => !self.reading_file,
            SourceParam::AdcRange | SourceParam::Trigger => true,
        }
    }

    /// Whether an analog-output file can be loaded. False in builds without
    /// HDF5 support, where every real waveform file would be refused.
    #[must_use]
    pub fn can_load_analog_output(&self) -> bool {
        HDF5_ENABLED && self.can_edit(SourceParam::AnalogOutput)
    }

    /// Whether any request or file read is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self.state, PanelState::Connecting | PanelState::Loading)
            || !self.pending.is_empty()
            || self.reading_file
    }

    /// Drain status bar notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Drain dialogs, oldest first.
    pub fn take_dialogs(&mut self) -> Vec<Dialog> {
        std::mem::take(&mut self.dialogs)
    }

    /// Change the ADC range.
    pub fn set_adc_range(&mut self, range: f64) {
        if !(MIN_ADC_RANGE..=MAX_ADC_RANGE).contains(&range) {
            self.dialogs.push(Dialog::warning(
                "Invalid ADC range",
                format!("The ADC range must be between {MIN_ADC_RANGE} and {MAX_ADC_RANGE} V"),
            ));
            return;
        }
        if range != self.params.adc_range {
            self.begin(AcquisitionField::AdcRange(range), ParamValue::Float(range));
        }
    }

    /// Change the trigger.
    pub fn set_trigger(&mut self, trigger: Trigger) {
        if trigger != self.params.trigger {
            self.begin(
                AcquisitionField::Trigger(trigger),
                ParamValue::from(trigger.as_str()),
            );
        }
    }

    /// Select a plug.
    pub fn set_plug(&mut self, plug: u32) {
        if plug > MAX_PLUG {
            self.dialogs.push(Dialog::warning(
                "Invalid plug",
                format!("The plug must be between 0 and {MAX_PLUG}"),
            ));
            return;
        }
        if Some(plug) != self.params.plug {
            self.begin(AcquisitionField::Plug(Some(plug)), ParamValue::from(plug));
        }
    }

    /// Send a chip configuration file.
    pub fn set_configuration_file(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.begin(
            AcquisitionField::ConfigurationFile(Some(path.clone())),
            ParamValue::Text(path),
        );
    }

    /// Read an analog-output waveform from `path` and send it.
    ///
    /// The file is read off the UI thread. A bad file produces a warning and
    /// leaves the current waveform alone.
    pub fn load_analog_output(&mut self, path: PathBuf) {
        if !self.can_edit(SourceParam::AnalogOutput) {
            return;
        }
        self.reading_file = true;
        let tx = self.tx.clone();
        let file = path.display().to_string();
        self.runtime.spawn(async move {
            let result = tokio::task::spawn_blocking(move || read_analog_output(&path))
                .await
                .unwrap_or_else(|e| {
                    Err(AnalogOutputError::Io {
                        path: file.clone(),
                        message: e.to_string(),
                    })
                });
            let _ = tx.send(PanelOutcome::FileRead { file, result }).await;
        });
    }

    /// Remove the analog-output waveform.
    pub fn clear_analog_output(&mut self) {
        if !self.can_edit(SourceParam::AnalogOutput) {
            return;
        }
        self.begin(
            AcquisitionField::AnalogOutput(AnalogOutputState::None),
            ParamValue::Samples(Vec::new()),
        );
    }

    /// Close the window and its session.
    pub fn close(&mut self) {
        if self.state == PanelState::Closed {
            return;
        }
        self.state = PanelState::Closed;
        self.cancel_connect = None;
        self.pending.clear();
        if let Some(watch) = self.error_watch.take() {
            watch.abort();
        }
        if let Some(client) = self.client.take() {
            tracing::debug!("Closing source settings session to {}", self.address);
            self.runtime.spawn(async move {
                let _ = client.disconnect().await;
            });
        }
    }

    /// Process completed requests. Call once per frame.
    pub fn update(&mut self) {
        while let Ok(outcome) = self.rx.try_recv() {
            self.handle(outcome);
        }
    }

    fn handle(&mut self, outcome: PanelOutcome) {
        if self.state == PanelState::Closed {
            if let PanelOutcome::Connected(Ok(client)) = outcome {
                self.runtime.spawn(async move {
                    let _ = client.disconnect().await;
                });
            }
            return;
        }

        match outcome {
            PanelOutcome::Connected(Ok(client)) => {
                self.cancel_connect = None;
                self.state = PanelState::Loading;
                self.watch_errors(&client);
                let status_client = Arc::clone(&client);
                self.client = Some(client);
                let tx = self.tx.clone();
                self.runtime.spawn(async move {
                    let status = status_client.source_status().await;
                    let _ = tx.send(PanelOutcome::Status(status)).await;
                });
            }
            PanelOutcome::Connected(Err(e)) => {
                tracing::warn!("Settings session could not connect: {}", e);
                self.dialogs.push(Dialog::warning(
                    "Could not connect",
                    format!(
                        "Could not connect to the BLDS at {}:\n\n{}",
                        self.address,
                        e.user_message()
                    ),
                ));
                self.close();
            }
            PanelOutcome::Status(Ok(status)) if !status.exists => {
                self.dialogs.push(Dialog::critical(
                    "No source!",
                    "There is no data source on the BLDS. Create one before changing its settings.",
                ));
                self.close();
            }
            PanelOutcome::Status(Ok(status)) => {
                self.params = AcquisitionParams::from_status(&status);
                self.source_type = status.source_type;
                self.state = PanelState::Ready;
                tracing::debug!("Loaded source settings: {:?}", self.params);
            }
            PanelOutcome::Status(Err(e)) => self.fail(&e),
            PanelOutcome::FileRead { file, result } => {
                self.reading_file = false;
                match result {
                    Ok(samples) => {
                        let field = AcquisitionField::AnalogOutput(AnalogOutputState::Loaded {
                            file,
                            samples: samples.len(),
                        });
                        self.begin(field, ParamValue::Samples(samples));
                    }
                    Err(e) => {
                        tracing::warn!("Rejected analog-output file {}: {}", file, e);
                        self.dialogs
                            .push(Dialog::warning("Invalid analog output file", e.to_string()));
                    }
                }
            }
            PanelOutcome::Set { field, id, result } => self.finish(field, id, result),
            PanelOutcome::SessionError(message) => {
                self.dialogs.push(Dialog::session_error(&message));
                self.close();
            }
        }
    }

    fn begin(&mut self, field: AcquisitionField, value: ParamValue) {
        let param = field.param();
        if !self.can_edit(param) {
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };
        let prior = self.params.field(param);
        let Some(id) = self.pending.begin(param, prior) else {
            return;
        };
        self.params.apply(field.clone());

        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = client.set_source(param, value).await;
            let _ = tx.send(PanelOutcome::Set { field, id, result }).await;
        });
    }

    fn finish(&mut self, field: AcquisitionField, id: RequestId, result: Result<(), ClientError>) {
        let param = field.param();
        let Some(prior) = self.pending.complete(param, id) else {
            tracing::trace!("Dropped stale reply for {}", param);
            return;
        };
        match result {
            Ok(()) => {
                if let Some(notification) = field.notification() {
                    tracing::info!("{}", notification);
                    self.notifications.push(notification);
                }
            }
            Err(e) if e.is_session_error() => {
                self.params.apply(prior);
                self.fail(&e);
            }
            Err(e) => {
                tracing::warn!("Setting {} failed: {}", param, e);
                self.params.apply(prior);
                self.dialogs.push(Dialog::warning(
                    format!("Could not change {param}"),
                    e.user_message(),
                ));
            }
        }
    }

    fn fail(&mut self, error: &ClientError) {
        tracing::error!("Settings session failed: {}", error);
        self.dialogs.push(Dialog::session_error(&error.user_message()));
        self.close();
    }

    fn watch_errors(&mut self, client: &Arc<dyn BldsClient>) {
        let mut errors = client.subscribe_errors();
        let tx = self.tx.clone();
        self.error_watch = Some(self.runtime.spawn(async move {
            loop {
                match errors.recv().await {
                    Ok(message) => {
                        let _ = tx.send(PanelOutcome::SessionError(message)).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }
}

impl Drop for SourceSettingsPanel {
    fn drop(&mut self) {
        self.close();
    }
}
