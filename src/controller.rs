//! Session controller for the main panel.
//!
//! Owns the BLDS session, runs the effects produced by
//! [`step`](crate::session::step) as tasks on the tokio runtime, and feeds
//! their results back through an mpsc channel that the UI drains once per
//! frame with [`SessionController::update`].
//!
//! Every task is tagged with the session epoch it was started under. The
//! epoch moves on whenever a session is abandoned (cancel, disconnect,
//! session failure), so replies from an old session are dropped before they
//! reach the state machine.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use blds_client::{
    AddressSource, BldsClient, ClientError, Connector, ParamValue, ServerAddress, ServerParam,
    ServerStatus,
};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::MeactlConfig;
use crate::session::{
    parse_recording_length, step, Action, Affordances, Dialog, Effect, Event, Notification,
    PendingTable, PollReport, RecordingField, RecordingKey, Request, RequestId, SessionState,
    Snapshot, SourceDescriptor,
};

/// Capacity of the completion channel.
const COMPLETION_CAPACITY: usize = 32;

/// Controller tunables.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Interval between recording polls
    pub poll_interval: Duration,
    /// Recording length shown while disconnected
    pub default_length: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            default_length: crate::session::DEFAULT_RECORDING_LENGTH,
        }
    }
}

impl From<&MeactlConfig> for ControllerSettings {
    fn from(config: &MeactlConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            default_length: config.recording.default_length,
        }
    }
}

enum Outcome {
    Connected(Result<Arc<dyn BldsClient>, ClientError>),
    InitialStatus(Result<ServerStatus, ClientError>),
    Request(Request, Result<(), ClientError>),
    SaveFile(Result<ParamValue, ClientError>),
    Poll {
        generation: u64,
        result: Result<PollReport, ClientError>,
    },
    ParamSet {
        field: RecordingField,
        id: RequestId,
        result: Result<(), ClientError>,
    },
    SessionError(String),
}

struct Completion {
    epoch: u64,
    outcome: Outcome,
}

#[derive(Debug)]
struct PollSchedule {
    interval: Duration,
    next_due: Option<Instant>,
    in_flight: bool,
    /// Bumped whenever polling stops; replies from older generations are stale
    generation: u64,
}

impl PollSchedule {
    fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    fn stop(&mut self) {
        self.next_due = None;
        self.in_flight = false;
        self.generation += 1;
    }
}

/// Drives the main panel's BLDS session.
pub struct SessionController {
    runtime: Handle,
    connector: Arc<dyn Connector>,
    client: Option<Arc<dyn BldsClient>>,
    address: Option<ServerAddress>,
    host_input: String,
    length_input: String,
    filename_input: String,
    snapshot: Snapshot,
    epoch: u64,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    cancel_connect: Option<oneshot::Sender<()>>,
    error_watch: Option<JoinHandle<()>>,
    reading_save_file: bool,
    poll: PollSchedule,
    /// Time passed to the most recent `update_at`
    clock: Instant,
    params: PendingTable<RecordingKey, RecordingField>,
    notifications: VecDeque<Notification>,
    dialogs: VecDeque<Dialog>,
}

impl SessionController {
    /// Create a disconnected controller with `host` in the host field.
    pub fn new(
        runtime: Handle,
        connector: Arc<dyn Connector>,
        settings: ControllerSettings,
        host: impl Into<String>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMPLETION_CAPACITY);
        let snapshot = Snapshot::new(settings.default_length);
        Self {
            runtime,
            connector,
            client: None,
            address: None,
            host_input: host.into(),
            length_input: snapshot.recording.length.to_string(),
            filename_input: String::new(),
            snapshot,
            epoch: 0,
            tx,
            rx,
            cancel_connect: None,
            error_watch: None,
            reading_save_file: false,
            poll: PollSchedule {
                interval: settings.poll_interval,
                next_due: None,
                in_flight: false,
                generation: 0,
            },
            params: PendingTable::new(),
            clock: Instant::now(),
            notifications: VecDeque::new(),
            dialogs: VecDeque::new(),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.snapshot.state
    }

    /// Address of the current or last session.
    #[must_use]
    pub fn address(&self) -> Option<&ServerAddress> {
        self.address.as_ref()
    }

    /// Enabled actions, including per-parameter locks.
    #[must_use]
    pub fn affordances(&self) -> Affordances {
        let mut set = self.snapshot.affordances();
        for (action, key) in [
            (Action::EditLength, RecordingKey::Length),
            (Action::EditFilename, RecordingKey::SaveFile),
            (Action::ChooseSaveDirectory, RecordingKey::SaveDirectory),
        ] {
            if self.params.is_pending(key) {
                set.set(action, false);
            }
        }
        if !self.params.is_empty() {
            set.set(Action::StartRecording, false);
        }
        set
    }

    /// Whether any request or poll is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.snapshot.pending.is_some()
            || self.poll.in_flight
            || self.reading_save_file
            || !self.params.is_empty()
    }

    /// Text of the host field.
    pub fn host_input_mut(&mut self) -> &mut String {
        &mut self.host_input
    }

    /// Text of the host field.
    #[must_use]
    pub fn host_input(&self) -> &str {
        &self.host_input
    }

    /// Text of the recording length field.
    pub fn length_input_mut(&mut self) -> &mut String {
        &mut self.length_input
    }

    /// Text of the save filename field.
    pub fn filename_input_mut(&mut self) -> &mut String {
        &mut self.filename_input
    }

    /// Source type and location, editable while no source exists.
    pub fn source_mut(&mut self) -> &mut SourceDescriptor {
        &mut self.snapshot.source
    }

    /// Drain status bar notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    /// Drain dialogs, oldest first.
    pub fn take_dialogs(&mut self) -> Vec<Dialog> {
        self.dialogs.drain(..).collect()
    }

    /// Connect to the host in the host field.
    pub fn connect(&mut self) {
        if !self.affordances().allows(Action::Connect) {
            return;
        }
        match ServerAddress::parse(&self.host_input, AddressSource::UserInput) {
            Ok(address) => {
                self.address = Some(address);
                self.handle(Event::ConnectRequested);
            }
            Err(e) => self
                .dialogs
                .push_back(Dialog::warning("Invalid server address", e.to_string())),
        }
    }

    /// Abandon a pending connect.
    pub fn cancel(&mut self) {
        self.handle(Event::CancelRequested);
    }

    /// Close the session.
    pub fn disconnect(&mut self) {
        self.handle(Event::DisconnectRequested);
    }

    /// Create a data source from the source fields.
    pub fn create_source(&mut self) {
        self.handle(Event::CreateRequested);
    }

    /// Delete the data source.
    pub fn delete_source(&mut self) {
        self.handle(Event::DeleteRequested);
    }

    /// Start recording.
    pub fn start_recording(&mut self) {
        if self.affordances().allows(Action::StartRecording) {
            self.handle(Event::StartRequested);
        }
    }

    /// Stop recording.
    pub fn stop_recording(&mut self) {
        self.handle(Event::StopRequested);
    }

    /// Address for a settings window, if one may be opened now.
    #[must_use]
    pub fn settings_address(&self) -> Option<ServerAddress> {
        if self.affordances().allows(Action::OpenSettings) {
            self.address.clone()
        } else {
            None
        }
    }

    /// Send the length typed in the length field.
    pub fn commit_length(&mut self) {
        if !self.affordances().allows(Action::EditLength) {
            return;
        }
        match parse_recording_length(&self.length_input) {
            Ok(length) if length == self.snapshot.recording.length => {}
            Ok(length) => self.begin_param(RecordingField::Length(length)),
            Err(msg) => {
                self.length_input = self.snapshot.recording.length.to_string();
                self.dialogs
                    .push_back(Dialog::warning("Invalid recording length", msg));
            }
        }
    }

    /// Send the filename typed in the filename field.
    pub fn commit_filename(&mut self) {
        if !self.affordances().allows(Action::EditFilename) {
            return;
        }
        let name = self.filename_input.trim().to_string();
        if name.is_empty() {
            self.filename_input = self.snapshot.recording.save_filename.clone();
            self.dialogs.push_back(Dialog::warning(
                "Invalid filename",
                "The recording filename cannot be empty",
            ));
        } else if name != self.snapshot.recording.save_filename {
            self.begin_param(RecordingField::SaveFile(name));
        }
    }

    /// Send a save directory chosen by the user.
    pub fn set_save_directory(&mut self, dir: impl Into<String>) {
        if self.affordances().allows(Action::ChooseSaveDirectory) {
            self.begin_param(RecordingField::SaveDirectory(dir.into()));
        }
    }

    /// Close the session without notifications, for application exit.
    pub fn shutdown(&mut self) {
        if self.client.is_some() || self.cancel_connect.is_some() {
            tracing::info!("Closing BLDS session on exit");
        }
        self.teardown();
    }

    /// Process completed requests and start due polls.
    pub fn update(&mut self) {
        self.update_at(Instant::now());
    }

    /// [`update`](Self::update) with an explicit clock.
    pub fn update_at(&mut self, now: Instant) {
        self.clock = now;
        while let Ok(completion) = self.rx.try_recv() {
            self.handle_completion(completion);
        }

        if self.snapshot.state == SessionState::RecordingActive && !self.poll.in_flight {
            if let Some(due) = self.poll.next_due {
                if now >= due {
                    self.poll.in_flight = true;
                    self.poll.next_due = Some(now + self.poll.interval);
                    let generation = self.poll.generation;
                    self.spawn(move |client| async move {
                        Outcome::Poll {
                            generation,
                            result: poll_recording(client.as_ref()).await,
                        }
                    });
                }
            }
        }
    }

    fn handle(&mut self, event: Event) {
        let (next, effects) = step(&self.snapshot, event);
        if next.state != self.snapshot.state {
            tracing::debug!("Session {} -> {}", self.snapshot.state, next.state);
        }
        let previous = std::mem::replace(&mut self.snapshot, next);
        self.sync_inputs(&previous);
        for effect in effects {
            self.run(effect);
        }
    }

    fn sync_inputs(&mut self, previous: &Snapshot) {
        if previous.recording.length != self.snapshot.recording.length {
            self.length_input = self.snapshot.recording.length.to_string();
        }
        if previous.recording.save_filename != self.snapshot.recording.save_filename {
            self.filename_input = self.snapshot.recording.save_filename.clone();
        }
    }

    fn run(&mut self, effect: Effect) {
        match effect {
            Effect::Connect => self.spawn_connect(),
            Effect::AbandonConnect => {
                if let Some(cancel) = self.cancel_connect.take() {
                    let _ = cancel.send(());
                }
                self.epoch += 1;
                tracing::info!("Connection attempt cancelled");
            }
            Effect::Disconnect => self.teardown(),
            Effect::FetchInitialStatus => {
                self.spawn(|client| async move { Outcome::InitialStatus(client.server_status().await) });
            }
            Effect::CreateSource {
                source_type,
                location,
            } => {
                tracing::info!("Creating {} source at '{}'", source_type, location);
                self.spawn(move |client| async move {
                    Outcome::Request(
                        Request::CreateSource,
                        client.create_source(source_type, &location).await,
                    )
                });
            }
            Effect::DeleteSource => self.spawn(|client| async move {
                Outcome::Request(Request::DeleteSource, client.delete_source().await)
            }),
            Effect::StartRecording => self.spawn(|client| async move {
                Outcome::Request(Request::StartRecording, client.start_recording().await)
            }),
            Effect::StopRecording => self.spawn(|client| async move {
                Outcome::Request(Request::StopRecording, client.stop_recording().await)
            }),
            Effect::ReadSaveFile => {
                self.reading_save_file = true;
                self.spawn(|client| async move {
                    Outcome::SaveFile(client.get(ServerParam::SaveFile).await)
                });
            }
            Effect::StartPolling => self.poll.start(self.clock),
            Effect::StopPolling => self.poll.stop(),
            Effect::Notify(notification) => {
                tracing::info!("{}", notification);
                self.notifications.push_back(notification);
            }
            Effect::Show(dialog) => self.dialogs.push_back(dialog),
        }
    }

    fn spawn_connect(&mut self) {
        let Some(address) = self.address.clone() else {
            tracing::error!("Connect requested without an address");
            return;
        };
        tracing::info!("Connecting to {} ({})", address, address.source().label());

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancel_connect = Some(cancel_tx);
        let connector = Arc::clone(&self.connector);
        let tx = self.tx.clone();
        let epoch = self.epoch;

        self.runtime.spawn(async move {
            tokio::select! {
                result = connector.connect(&address) => {
                    let _ = tx.send(Completion { epoch, outcome: Outcome::Connected(result) }).await;
                }
                _ = cancel_rx => {
                    tracing::debug!("Connect attempt to {} abandoned", address);
                }
            }
        });
    }

    fn spawn<F, Fut>(&self, request: F)
    where
        F: FnOnce(Arc<dyn BldsClient>) -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let Some(client) = self.client.clone() else {
            tracing::error!("Request issued without a BLDS session");
            return;
        };
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let fut = request(client);
        self.runtime.spawn(async move {
            let outcome = fut.await;
            let _ = tx.send(Completion { epoch, outcome }).await;
        });
    }

    fn watch_errors(&mut self, client: &Arc<dyn BldsClient>) {
        let mut errors = client.subscribe_errors();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        self.error_watch = Some(self.runtime.spawn(async move {
            loop {
                match errors.recv().await {
                    Ok(message) => {
                        let _ = tx
                            .send(Completion {
                                epoch,
                                outcome: Outcome::SessionError(message),
                            })
                            .await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Missed {} BLDS error messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    fn teardown(&mut self) {
        self.epoch += 1;
        self.cancel_connect = None;
        if let Some(watch) = self.error_watch.take() {
            watch.abort();
        }
        if let Some(client) = self.client.take() {
            tracing::info!("Disconnecting from {}", client.address());
            self.runtime.spawn(async move {
                if let Err(e) = client.disconnect().await {
                    tracing::debug!("Disconnect failed: {}", e);
                }
            });
        }
        self.poll.stop();
        self.params.clear();
        self.reading_save_file = false;
    }

    fn handle_completion(&mut self, completion: Completion) {
        if completion.epoch != self.epoch {
            if let Outcome::Connected(Ok(client)) = completion.outcome {
                tracing::debug!("Ignored stale session to {}", client.address());
                self.runtime.spawn(async move {
                    let _ = client.disconnect().await;
                });
            }
            return;
        }

        match completion.outcome {
            Outcome::Connected(result) => {
                self.cancel_connect = None;
                match result {
                    Ok(client) if self.snapshot.pending == Some(Request::Connect) => {
                        self.watch_errors(&client);
                        self.client = Some(client);
                        self.handle(Event::Connected);
                    }
                    Ok(client) => {
                        tracing::debug!("Ignored Connected result (state={})", self.snapshot.state);
                        self.runtime.spawn(async move {
                            let _ = client.disconnect().await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Connection failed: {}", e);
                        self.handle(Event::ConnectFailed(e));
                    }
                }
            }
            Outcome::InitialStatus(result) => self.handle(Event::InitialStatus(result)),
            Outcome::Request(request, result) => {
                if let Err(e) = &result {
                    tracing::warn!("{:?} failed: {}", request, e);
                }
                self.handle(Event::RequestFinished { request, result });
            }
            Outcome::SaveFile(result) => {
                self.reading_save_file = false;
                match result.and_then(|v| v.as_text().map(str::to_string)) {
                    Ok(file) => self.handle(Event::SaveFileRead(file)),
                    Err(e) => self.request_error("Could not read the save file", e),
                }
            }
            Outcome::Poll { generation, result } => {
                if generation != self.poll.generation {
                    tracing::trace!("Dropped poll reply from generation {}", generation);
                    return;
                }
                self.poll.in_flight = false;
                match result {
                    Ok(report) => self.handle(Event::Polled(report)),
                    Err(e) if e.is_session_error() => {
                        self.handle(Event::SessionFailed(e.user_message()));
                    }
                    Err(e) => tracing::warn!("Recording poll failed: {}", e),
                }
            }
            Outcome::ParamSet { field, id, result } => self.finish_param(field, id, result),
            Outcome::SessionError(message) => self.handle(Event::SessionFailed(message)),
        }
    }

    fn begin_param(&mut self, field: RecordingField) {
        let key = field.key();
        let prior = self.snapshot.recording.field(key);
        let Some(id) = self.params.begin(key, prior) else {
            return;
        };
        let previous = self.snapshot.clone();
        self.snapshot.recording.apply(field.clone());
        self.sync_inputs(&previous);

        let value = field.to_param_value();
        self.spawn(move |client| async move {
            let result = client.set(key.server_param(), value).await;
            Outcome::ParamSet { field, id, result }
        });
    }

    fn finish_param(&mut self, field: RecordingField, id: RequestId, result: Result<(), ClientError>) {
        let Some(prior) = self.params.complete(field.key(), id) else {
            tracing::trace!("Dropped stale reply for {:?}", field.key());
            return;
        };
        match result {
            Ok(()) => {
                let notification = match field {
                    RecordingField::Length(length) => Notification::LengthChanged(length),
                    RecordingField::SaveFile(file) => Notification::FilenameSet(file),
                    RecordingField::SaveDirectory(dir) => Notification::SaveDirectorySet(dir),
                };
                self.run(Effect::Notify(notification));
            }
            Err(e) => {
                let previous = self.snapshot.clone();
                self.snapshot.recording.apply(prior);
                self.sync_inputs(&previous);
                let title = match field.key() {
                    RecordingKey::Length => "Could not change the recording length",
                    RecordingKey::SaveFile => "Could not change the recording filename",
                    RecordingKey::SaveDirectory => "Could not change the save directory",
                };
                self.request_error(title, e);
            }
        }
    }

    fn request_error(&mut self, title: &str, error: ClientError) {
        if error.is_session_error() {
            self.handle(Event::SessionFailed(error.user_message()));
        } else {
            tracing::warn!("{}: {}", title, error);
            self.dialogs
                .push_back(Dialog::warning(title, error.user_message()));
        }
    }
}

/// One poll: is the recording still there, and if not, is the source?
async fn poll_recording(client: &dyn BldsClient) -> Result<PollReport, ClientError> {
    if client.get(ServerParam::RecordingExists).await?.as_bool()? {
        let position = client.get(ServerParam::RecordingPosition).await?.as_f64()?;
        Ok(PollReport::Recording { position })
    } else {
        let source_exists = client.get(ServerParam::SourceExists).await?.as_bool()?;
        Ok(PollReport::Stopped { source_exists })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blds_client::{SimConfig, SimulatedServer};
    use tracing_test::traced_test;

    fn server() -> SimulatedServer {
        SimulatedServer::with_config(SimConfig {
            hosts: vec!["localhost".into()],
            latency: Duration::ZERO,
        })
    }

    fn controller(runtime: &tokio::runtime::Runtime, host: &str) -> SessionController {
        controller_for(runtime, &server(), host)
    }

    fn controller_for(
        runtime: &tokio::runtime::Runtime,
        server: &SimulatedServer,
        host: &str,
    ) -> SessionController {
        SessionController::new(
            runtime.handle().clone(),
            Arc::new(server.connector()),
            ControllerSettings::default(),
            host,
        )
    }

    fn settle(controller: &mut SessionController) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.is_busy() {
            assert!(Instant::now() < deadline, "controller did not settle");
            std::thread::sleep(Duration::from_millis(2));
            controller.update();
        }
    }

    #[test]
    #[traced_test]
    fn test_connect_logs_address_and_source() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut controller = controller(&runtime, "localhost");
        controller.connect();
        settle(&mut controller);

        assert_eq!(controller.state(), SessionState::ConnectedNoSource);
        assert!(logs_contain("Connecting to localhost:12345 (user)"));
    }

    #[test]
    fn test_poll_only_runs_while_recording() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut controller = controller(&runtime, "localhost");
        controller.connect();
        settle(&mut controller);

        controller.update_at(Instant::now() + Duration::from_secs(60));
        assert!(!controller.poll.in_flight);
        assert_eq!(controller.poll.next_due, None);
    }

    #[test]
    fn test_poll_schedule_follows_caller_clock() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let server = server();
        let address = ServerAddress::parse("localhost", AddressSource::UserInput).unwrap();
        runtime.block_on(async {
            let other = server.connector().connect(&address).await.unwrap();
            other.create_source(blds_client::SourceType::Mcs, "").await.unwrap();
            other.start_recording().await.unwrap();
        });

        let mut controller = controller_for(&runtime, &server, "localhost");
        let later = Instant::now() + Duration::from_secs(3600);
        controller.connect();
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.state() != SessionState::RecordingActive {
            assert!(Instant::now() < deadline, "controller did not reach recording");
            std::thread::sleep(Duration::from_millis(2));
            controller.update_at(later);
        }

        let interval = ControllerSettings::default().poll_interval;
        assert_eq!(controller.poll.next_due, Some(later + interval));
        controller.update_at(later);
        assert!(!controller.poll.in_flight);
        controller.update_at(later + interval);
        assert!(controller.poll.in_flight);
    }

    #[test]
    fn test_teardown_drops_stale_replies() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut controller = controller(&runtime, "localhost");
        controller.connect();
        settle(&mut controller);
        controller.source_mut().location = "/tmp/x.h5".into();
        controller.create_source();
        controller.take_notifications();
        let epoch = controller.epoch;
        controller.disconnect();
        assert!(controller.epoch > epoch);

        std::thread::sleep(Duration::from_millis(50));
        controller.update();
        assert_eq!(controller.state(), SessionState::Disconnected);
        assert_eq!(controller.take_notifications(), vec![Notification::Disconnected]);
    }

    #[test]
    fn test_settings_address_requires_source() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut controller = controller(&runtime, "localhost");
        assert!(controller.settings_address().is_none());
        controller.connect();
        settle(&mut controller);
        assert!(controller.settings_address().is_none());

        controller.source_mut().location = "/tmp/x.h5".into();
        controller.create_source();
        settle(&mut controller);
        assert_eq!(
            controller.settings_address().map(|a| a.to_string()),
            Some("localhost:12345".to_string())
        );
    }
}
