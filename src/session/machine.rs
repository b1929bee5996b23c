//! Pure transition function for the main panel.
//!
//! [`step`] never performs I/O. It returns the next [`Snapshot`] and the
//! [`Effect`]s the controller must carry out: requests to issue, polling to
//! start or stop, notifications and dialogs. Events that do not fit the
//! current state or the outstanding request are ignored, which is how late
//! replies after a cancel or disconnect are discarded.

use blds_client::{ClientError, ServerStatus, SourceType};

use super::notify::{Dialog, Notification};
use super::records::{RecordingParams, SourceDescriptor};
use super::state::{affordances, Action, Affordances, Request, SessionState};

/// Everything the main panel shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: SessionState,
    /// Session-level request in flight, if any
    pub pending: Option<Request>,
    pub recording: RecordingParams,
    pub source: SourceDescriptor,
    default_length: u32,
}

impl Snapshot {
    /// A disconnected snapshot showing `default_length` as the recording length.
    #[must_use]
    pub fn new(default_length: u32) -> Self {
        Self {
            state: SessionState::Disconnected,
            pending: None,
            recording: RecordingParams::new(default_length),
            source: SourceDescriptor::default(),
            default_length,
        }
    }

    /// Enabled actions.
    #[must_use]
    pub fn affordances(&self) -> Affordances {
        affordances(self.state, self.pending)
    }

    fn reset(&mut self) {
        *self = Self::new(self.default_length);
    }
}

/// Result of one recording poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollReport {
    /// The recording is still running.
    Recording { position: f64 },
    /// The recording is gone; `source_exists` says whether the source is too.
    Stopped { source_exists: bool },
}

/// Input to [`step`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ConnectRequested,
    CancelRequested,
    DisconnectRequested,
    CreateRequested,
    DeleteRequested,
    StartRequested,
    StopRequested,
    /// The connect attempt produced a session.
    Connected,
    ConnectFailed(ClientError),
    InitialStatus(Result<ServerStatus, ClientError>),
    RequestFinished {
        request: Request,
        result: Result<(), ClientError>,
    },
    SaveFileRead(String),
    Polled(PollReport),
    /// The session broke outside any request.
    SessionFailed(String),
}

/// Work for the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Connect,
    /// Drop the connect attempt in flight.
    AbandonConnect,
    /// Close and drop the session.
    Disconnect,
    FetchInitialStatus,
    CreateSource {
        source_type: SourceType,
        location: String,
    },
    DeleteSource,
    StartRecording,
    StopRecording,
    ReadSaveFile,
    StartPolling,
    StopPolling,
    Notify(Notification),
    Show(Dialog),
}

/// Apply `event` to `snapshot`.
#[must_use]
pub fn step(snapshot: &Snapshot, event: Event) -> (Snapshot, Vec<Effect>) {
    let mut next = snapshot.clone();
    let mut effects = Vec::new();
    let allowed = snapshot.affordances();

    match event {
        Event::ConnectRequested if allowed.allows(Action::Connect) => {
            next.state = SessionState::Connecting;
            next.pending = Some(Request::Connect);
            effects.push(Effect::Connect);
        }
        Event::CancelRequested if allowed.allows(Action::Cancel) => {
            next.reset();
            effects.push(Effect::AbandonConnect);
            effects.push(Effect::Notify(Notification::ConnectCanceled));
        }
        Event::DisconnectRequested if allowed.allows(Action::Disconnect) => {
            next.reset();
            effects.push(Effect::Disconnect);
            effects.push(Effect::Notify(Notification::Disconnected));
        }
        Event::Connected if snapshot.pending == Some(Request::Connect) => {
            // Locked until the initial status arrives.
            next.state = SessionState::ConnectedNoSource;
            next.pending = Some(Request::InitialStatus);
            effects.push(Effect::FetchInitialStatus);
            effects.push(Effect::Notify(Notification::Connected));
        }
        Event::ConnectFailed(err) if snapshot.pending == Some(Request::Connect) => {
            next.reset();
            effects.push(Effect::Notify(Notification::ConnectFailed));
            effects.push(Effect::Show(Dialog::warning(
                "Could not connect",
                err.user_message(),
            )));
        }
        Event::InitialStatus(result) if snapshot.pending == Some(Request::InitialStatus) => {
            match result {
                Ok(status) => reconcile(&mut next, &status, &mut effects),
                Err(err) => fail_session(&mut next, &err.user_message(), &mut effects),
            }
        }
        Event::CreateRequested if allowed.allows(Action::CreateSource) => {
            match snapshot.source.validate() {
                Ok(()) => {
                    next.pending = Some(Request::CreateSource);
                    effects.push(Effect::CreateSource {
                        source_type: snapshot.source.source_type,
                        location: snapshot.source.effective_location().to_string(),
                    });
                }
                Err(msg) => effects.push(Effect::Show(Dialog::warning(
                    "Cannot create data source",
                    msg,
                ))),
            }
        }
        Event::DeleteRequested if allowed.allows(Action::DeleteSource) => {
            next.pending = Some(Request::DeleteSource);
            effects.push(Effect::DeleteSource);
        }
        Event::StartRequested if allowed.allows(Action::StartRecording) => {
            next.pending = Some(Request::StartRecording);
            effects.push(Effect::StartRecording);
        }
        Event::StopRequested if allowed.allows(Action::StopRecording) => {
            next.pending = Some(Request::StopRecording);
            effects.push(Effect::StopRecording);
        }
        Event::RequestFinished { request, result } if snapshot.pending == Some(request) => {
            match result {
                Ok(()) => {
                    next.pending = None;
                    commit(&mut next, request, &mut effects);
                }
                Err(err) if err.is_session_error() => {
                    fail_session(&mut next, &err.user_message(), &mut effects);
                }
                Err(err) => {
                    // State and affordances go back to what they were.
                    next.pending = None;
                    effects.push(Effect::Show(Dialog::warning(
                        failure_title(request),
                        err.user_message(),
                    )));
                }
            }
        }
        Event::SaveFileRead(file) if snapshot.state.is_connected() => {
            next.recording.save_filename = file;
        }
        Event::Polled(report) if snapshot.state == SessionState::RecordingActive => match report {
            PollReport::Recording { position } => next.recording.position = position,
            PollReport::Stopped { source_exists } => {
                // Same wiring as a local stop, plus a delete if the source went too.
                next.pending = None;
                next.recording.position = 0.0;
                effects.push(Effect::StopPolling);
                effects.push(Effect::Notify(Notification::RecordingStopped));
                if source_exists {
                    next.state = SessionState::SourceExists;
                } else {
                    next.state = SessionState::ConnectedNoSource;
                    effects.push(Effect::Notify(Notification::SourceDeleted));
                }
            }
        },
        Event::SessionFailed(msg) if snapshot.state.is_connected() => {
            fail_session(&mut next, &msg, &mut effects);
        }
        other => {
            tracing::trace!("Ignoring {:?} in state {}", other, snapshot.state);
        }
    }

    (next, effects)
}

fn reconcile(next: &mut Snapshot, status: &ServerStatus, effects: &mut Vec<Effect>) {
    next.pending = None;
    next.recording.apply_status(status);
    if status.source_exists {
        next.source.apply_status(status);
    }
    next.state = if status.recording_exists {
        effects.push(Effect::StartPolling);
        SessionState::RecordingActive
    } else if status.source_exists {
        SessionState::SourceExists
    } else {
        SessionState::ConnectedNoSource
    };
    tracing::info!("Initial BLDS status: {}", next.state);
}

fn commit(next: &mut Snapshot, request: Request, effects: &mut Vec<Effect>) {
    match request {
        Request::CreateSource => {
            next.state = SessionState::SourceExists;
            if !next.source.source_type.takes_location() {
                next.source.location.clear();
            }
            effects.push(Effect::Notify(Notification::SourceCreated));
        }
        Request::DeleteSource => {
            next.state = SessionState::ConnectedNoSource;
            effects.push(Effect::Notify(Notification::SourceDeleted));
        }
        Request::StartRecording => {
            next.state = SessionState::RecordingActive;
            next.recording.position = 0.0;
            effects.push(Effect::ReadSaveFile);
            effects.push(Effect::StartPolling);
            effects.push(Effect::Notify(Notification::RecordingStarted));
        }
        Request::StopRecording => {
            next.state = SessionState::SourceExists;
            next.recording.position = 0.0;
            effects.push(Effect::StopPolling);
            effects.push(Effect::Notify(Notification::RecordingStopped));
        }
        Request::Connect | Request::InitialStatus => {}
    }
}

fn fail_session(next: &mut Snapshot, message: &str, effects: &mut Vec<Effect>) {
    tracing::error!("BLDS session failed: {}", message);
    if next.state == SessionState::RecordingActive {
        effects.push(Effect::StopPolling);
    }
    next.reset();
    effects.push(Effect::Disconnect);
    effects.push(Effect::Show(Dialog::session_error(message)));
    effects.push(Effect::Notify(Notification::Disconnected));
}

fn failure_title(request: Request) -> &'static str {
    match request {
        Request::CreateSource => "Could not create data source",
        Request::DeleteSource => "Could not delete data source",
        Request::StartRecording => "Could not start recording",
        Request::StopRecording => "Could not stop recording",
        Request::Connect | Request::InitialStatus => "Could not connect",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Severity;

    fn run(snapshot: &Snapshot, events: Vec<Event>) -> (Snapshot, Vec<Effect>) {
        let mut current = snapshot.clone();
        let mut all = Vec::new();
        for event in events {
            let (next, effects) = step(&current, event);
            current = next;
            all.extend(effects);
        }
        (current, all)
    }

    fn connected(status: ServerStatus) -> Snapshot {
        run(
            &Snapshot::new(1000),
            vec![
                Event::ConnectRequested,
                Event::Connected,
                Event::InitialStatus(Ok(status)),
            ],
        )
        .0
    }

    fn with_source() -> Snapshot {
        connected(ServerStatus {
            source_exists: true,
            source_type: Some(SourceType::File),
            source_location: "/tmp/x.h5".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_connect_then_initial_status() {
        let (snap, effects) = step(&Snapshot::new(1000), Event::ConnectRequested);
        assert_eq!(snap.state, SessionState::Connecting);
        assert_eq!(effects, vec![Effect::Connect]);

        let (snap, effects) = step(&snap, Event::Connected);
        assert_eq!(snap.pending, Some(Request::InitialStatus));
        assert!(effects.contains(&Effect::FetchInitialStatus));
        assert!(!snap.affordances().allows(Action::CreateSource));
        assert!(snap.affordances().allows(Action::Disconnect));

        let (snap, _) = step(&snap, Event::InitialStatus(Ok(ServerStatus::default())));
        assert_eq!(snap.state, SessionState::ConnectedNoSource);
        assert_eq!(snap.pending, None);
    }

    #[test]
    fn test_initial_status_with_recording_starts_polling() {
        let status = ServerStatus {
            source_exists: true,
            source_type: Some(SourceType::Hidens),
            source_location: "rig".into(),
            recording_exists: true,
            recording_length: 1200,
            recording_position: 33.3,
            save_file: "run.h5".into(),
            ..Default::default()
        };
        let (snap, effects) = run(
            &Snapshot::new(1000),
            vec![
                Event::ConnectRequested,
                Event::Connected,
                Event::InitialStatus(Ok(status)),
            ],
        );
        assert_eq!(snap.state, SessionState::RecordingActive);
        assert_eq!(snap.source.source_type, SourceType::Hidens);
        assert_eq!(snap.source.location, "rig");
        assert_eq!(snap.recording.length, 1200);
        assert_eq!(snap.recording.position_text(), "33.3");
        assert_eq!(snap.recording.save_filename, "run.h5");
        assert!(effects.contains(&Effect::StartPolling));
    }

    #[test]
    fn test_cancel_ignores_late_success() {
        let (snap, _) = run(
            &Snapshot::new(1000),
            vec![Event::ConnectRequested, Event::CancelRequested],
        );
        assert_eq!(snap.state, SessionState::Disconnected);

        let (late, effects) = step(&snap, Event::Connected);
        assert_eq!(late, snap);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_connect_failure_returns_to_disconnected() {
        let (snap, effects) = run(
            &Snapshot::new(1000),
            vec![
                Event::ConnectRequested,
                Event::ConnectFailed(ClientError::Connection("refused".into())),
            ],
        );
        assert_eq!(snap.state, SessionState::Disconnected);
        assert!(effects.contains(&Effect::Notify(Notification::ConnectFailed)));
    }

    #[test]
    fn test_create_source_commits_on_success() {
        let mut snap = connected(ServerStatus::default());
        snap.source.location = "/tmp/x.h5".into();
        let (snap, effects) = step(&snap, Event::CreateRequested);
        assert_eq!(
            effects,
            vec![Effect::CreateSource {
                source_type: SourceType::File,
                location: "/tmp/x.h5".into()
            }]
        );
        let (snap, _) = step(
            &snap,
            Event::RequestFinished {
                request: Request::CreateSource,
                result: Ok(()),
            },
        );
        assert_eq!(snap.state, SessionState::SourceExists);
        assert_eq!(snap.state.source_button_label(), "Delete");
        assert!(snap.affordances().allows(Action::StartRecording));
    }

    #[test]
    fn test_create_without_location_shows_dialog() {
        let snap = connected(ServerStatus::default());
        let (next, effects) = step(&snap, Event::CreateRequested);
        assert_eq!(next, snap);
        assert!(matches!(effects.as_slice(), [Effect::Show(d)] if d.severity == Severity::Warning));
    }

    #[test]
    fn test_rejected_request_restores_affordances() {
        let before = with_source();
        let (pending, _) = step(&before, Event::StartRequested);
        assert!(!pending.affordances().allows(Action::StartRecording));

        let (after, effects) = step(
            &pending,
            Event::RequestFinished {
                request: Request::StartRecording,
                result: Err(ClientError::Rejected("busy".into())),
            },
        );
        assert_eq!(after, before);
        assert_eq!(after.affordances(), before.affordances());
        assert!(matches!(&effects[..], [Effect::Show(d)] if d.message == "busy"));
    }

    #[test]
    fn test_rejected_delete_restores_affordances() {
        let before = with_source();
        let (pending, _) = step(&before, Event::DeleteRequested);
        assert_eq!(pending.affordances().iter().collect::<Vec<_>>(), vec![Action::Disconnect]);

        let (after, effects) = step(
            &pending,
            Event::RequestFinished {
                request: Request::DeleteSource,
                result: Err(ClientError::Rejected("in use".into())),
            },
        );
        assert_eq!(after, before);
        assert_eq!(after.state, SessionState::SourceExists);
        assert_eq!(after.affordances(), before.affordances());
        assert!(matches!(&effects[..], [Effect::Show(d)] if d.title == "Could not delete data source"));
    }

    #[test]
    fn test_rejected_stop_restores_affordances() {
        let (before, _) = run(
            &with_source(),
            vec![
                Event::StartRequested,
                Event::RequestFinished {
                    request: Request::StartRecording,
                    result: Ok(()),
                },
            ],
        );
        let (pending, _) = step(&before, Event::StopRequested);
        assert_eq!(pending.affordances(), Affordances::none());

        let (after, effects) = step(
            &pending,
            Event::RequestFinished {
                request: Request::StopRecording,
                result: Err(ClientError::Rejected("busy".into())),
            },
        );
        assert_eq!(after, before);
        assert_eq!(after.state, SessionState::RecordingActive);
        assert_eq!(after.affordances(), before.affordances());
        assert!(!effects.contains(&Effect::StopPolling));
        assert!(matches!(&effects[..], [Effect::Show(d)] if d.title == "Could not stop recording"));
    }

    #[test]
    fn test_start_then_stop() {
        let (snap, effects) = run(
            &with_source(),
            vec![
                Event::StartRequested,
                Event::RequestFinished {
                    request: Request::StartRecording,
                    result: Ok(()),
                },
            ],
        );
        assert_eq!(snap.state, SessionState::RecordingActive);
        assert!(effects.contains(&Effect::ReadSaveFile));
        assert!(effects.contains(&Effect::StartPolling));

        let (snap, _) = step(&snap, Event::Polled(PollReport::Recording { position: 4.26 }));
        assert_eq!(snap.recording.position_text(), "4.3");

        let (snap, effects) = run(
            &snap,
            vec![
                Event::StopRequested,
                Event::RequestFinished {
                    request: Request::StopRecording,
                    result: Ok(()),
                },
            ],
        );
        assert_eq!(snap.state, SessionState::SourceExists);
        assert_eq!(snap.recording.position_text(), "0.0");
        assert!(effects.contains(&Effect::StopPolling));
    }

    #[test]
    fn test_poll_observes_stop_and_delete() {
        let recording = connected(ServerStatus {
            source_exists: true,
            recording_exists: true,
            ..Default::default()
        });

        let (snap, _) = step(
            &recording,
            Event::Polled(PollReport::Stopped { source_exists: true }),
        );
        assert_eq!(snap.state, SessionState::SourceExists);
        assert!(snap.affordances().allows(Action::EditLength));

        let (snap, effects) = step(
            &recording,
            Event::Polled(PollReport::Stopped {
                source_exists: false,
            }),
        );
        assert_eq!(snap.state, SessionState::ConnectedNoSource);
        assert!(effects.contains(&Effect::Notify(Notification::SourceDeleted)));
    }

    #[test]
    fn test_poll_outside_recording_ignored() {
        let snap = with_source();
        let (next, effects) = step(&snap, Event::Polled(PollReport::Recording { position: 9.0 }));
        assert_eq!(next, snap);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_transport_error_forces_disconnect() {
        let (pending, _) = step(&with_source(), Event::DeleteRequested);
        let (snap, effects) = step(
            &pending,
            Event::RequestFinished {
                request: Request::DeleteSource,
                result: Err(ClientError::Transport("reset".into())),
            },
        );
        assert_eq!(snap, Snapshot::new(1000));
        assert!(effects.contains(&Effect::Disconnect));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Show(d) if d.severity == Severity::Critical)));
    }

    #[test]
    fn test_disconnect_while_pending_discards_reply() {
        let (pending, _) = step(&with_source(), Event::DeleteRequested);
        assert!(pending.affordances().allows(Action::Disconnect));
        let (snap, _) = step(&pending, Event::DisconnectRequested);
        assert_eq!(snap.state, SessionState::Disconnected);

        let (late, effects) = step(
            &snap,
            Event::RequestFinished {
                request: Request::DeleteSource,
                result: Ok(()),
            },
        );
        assert_eq!(late, snap);
        assert!(effects.is_empty());
    }
}
