//! Session states and the actions each one enables.

use std::fmt;

/// Where the main panel's session with the BLDS currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No session; only the host field and Connect are live.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected, the server has no data source.
    ConnectedNoSource,
    /// Connected, a data source exists but nothing is recording.
    SourceExists,
    /// A recording is running.
    RecordingActive,
}

impl SessionState {
    /// All states.
    pub const ALL: [SessionState; 5] = [
        Self::Disconnected,
        Self::Connecting,
        Self::ConnectedNoSource,
        Self::SourceExists,
        Self::RecordingActive,
    ];

    /// Whether a client session is held in this state.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            Self::ConnectedNoSource | Self::SourceExists | Self::RecordingActive
        )
    }

    /// Label of the connect/cancel/disconnect button.
    #[must_use]
    pub fn connect_button_label(self) -> &'static str {
        match self {
            Self::Disconnected => "Connect",
            Self::Connecting => "Cancel",
            _ => "Disconnect",
        }
    }

    /// Label of the create/delete source button.
    #[must_use]
    pub fn source_button_label(self) -> &'static str {
        match self {
            Self::SourceExists | Self::RecordingActive => "Delete",
            _ => "Create",
        }
    }

    /// Label of the start/stop recording button.
    #[must_use]
    pub fn recording_button_label(self) -> &'static str {
        match self {
            Self::RecordingActive => "Stop",
            _ => "Start",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::ConnectedNoSource => "connected, no source",
            Self::SourceExists => "source exists",
            Self::RecordingActive => "recording",
        };
        f.write_str(name)
    }
}

/// A session-level request the panel can have in flight. At most one is
/// outstanding at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    Connect,
    InitialStatus,
    CreateSource,
    DeleteSource,
    StartRecording,
    StopRecording,
}

/// Something the user can do in the main panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Connect,
    Cancel,
    Disconnect,
    EditHost,
    EditSource,
    CreateSource,
    DeleteSource,
    StartRecording,
    StopRecording,
    OpenSettings,
    EditLength,
    EditFilename,
    ChooseSaveDirectory,
}

impl Action {
    /// All actions.
    pub const ALL: [Action; 13] = [
        Self::Connect,
        Self::Cancel,
        Self::Disconnect,
        Self::EditHost,
        Self::EditSource,
        Self::CreateSource,
        Self::DeleteSource,
        Self::StartRecording,
        Self::StopRecording,
        Self::OpenSettings,
        Self::EditLength,
        Self::EditFilename,
        Self::ChooseSaveDirectory,
    ];

    /// Whether the action is legal in `state` when nothing is in flight.
    #[must_use]
    pub fn is_legal_in(self, state: SessionState) -> bool {
        use SessionState as S;
        match self {
            Self::Connect | Self::EditHost => state == S::Disconnected,
            Self::Cancel => state == S::Connecting,
            Self::Disconnect | Self::EditLength | Self::EditFilename | Self::ChooseSaveDirectory => {
                matches!(state, S::ConnectedNoSource | S::SourceExists)
            }
            Self::EditSource | Self::CreateSource => state == S::ConnectedNoSource,
            Self::DeleteSource | Self::StartRecording | Self::OpenSettings => {
                state == S::SourceExists
            }
            Self::StopRecording => state == S::RecordingActive,
        }
    }

    /// Whether the action stays available while a request is in flight.
    #[must_use]
    pub fn allowed_while_pending(self) -> bool {
        matches!(self, Self::Cancel | Self::Disconnect)
    }
}

/// The set of enabled actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Affordances {
    enabled: u16,
}

impl Affordances {
    /// Nothing enabled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether `action` is enabled.
    #[must_use]
    pub fn allows(self, action: Action) -> bool {
        self.enabled & bit(action) != 0
    }

    /// Enable or disable `action`.
    pub fn set(&mut self, action: Action, enabled: bool) {
        if enabled {
            self.enabled |= bit(action);
        } else {
            self.enabled &= !bit(action);
        }
    }

    /// Enabled actions, in [`Action::ALL`] order.
    pub fn iter(self) -> impl Iterator<Item = Action> {
        Action::ALL.into_iter().filter(move |a| self.allows(*a))
    }
}

fn bit(action: Action) -> u16 {
    1 << (action as u16)
}

/// Affordances for `state` with `pending` in flight.
///
/// An action is enabled when it is legal in the state and, if a request is
/// pending, it is one of the actions that stay live meanwhile.
#[must_use]
pub fn affordances(state: SessionState, pending: Option<Request>) -> Affordances {
    let mut set = Affordances::none();
    for action in Action::ALL {
        let enabled =
            action.is_legal_in(state) && (pending.is_none() || action.allowed_while_pending());
        set.set(action, enabled);
    }
    set
}
