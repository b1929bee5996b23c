//! Session state for the main control panel.
//!
//! The panel's behaviour is a small state machine over [`SessionState`].
//! Everything the widgets show is derived from a [`Snapshot`]:
//!
//! - [`state`] defines the states and the [`Affordances`] (which user
//!   actions are enabled) for each of them.
//! - [`machine`] holds the pure transition function [`step`], which turns a
//!   snapshot and an [`Event`] into a new snapshot and a list of [`Effect`]s
//!   for the controller to carry out.
//! - [`records`] holds the recording parameters and source descriptor the
//!   panel edits and displays.
//! - [`pending`] tracks outstanding per-parameter requests so stale replies
//!   can be recognised and failed edits rolled back.
//! - [`notify`] holds status-bar notifications and modal dialogs.

pub mod machine;
pub mod notify;
pub mod pending;
pub mod records;
pub mod state;

pub use machine::{step, Effect, Event, PollReport, Snapshot};
pub use notify::{Dialog, Notification, Severity};
pub use pending::{PendingTable, RequestId};
pub use records::{
    parse_recording_length, RecordingField, RecordingKey, RecordingParams, SourceDescriptor,
    DEFAULT_RECORDING_LENGTH, MAX_RECORDING_LENGTH, MIN_RECORDING_LENGTH,
};
pub use state::{affordances, Action, Affordances, Request, SessionState};
