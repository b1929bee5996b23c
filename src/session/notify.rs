//! Status-bar notifications and modal dialogs.

use blds_client::Trigger;
use std::fmt;

/// Title of the dialog shown when the session fails.
pub const SESSION_ERROR_TITLE: &str = "BLDS error";

/// A short, transient message for the status bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Connected,
    ConnectFailed,
    Disconnected,
    ConnectCanceled,
    SourceCreated,
    SourceDeleted,
    RecordingStarted,
    RecordingStopped,
    FilenameSet(String),
    LengthChanged(u32),
    SaveDirectorySet(String),
    AdcRangeChanged(f64),
    TriggerSet(Trigger),
    PlugSet(u32),
    ConfigurationRead(String),
    AnalogOutputRead(String),
    AnalogOutputCleared,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("Connected to BLDS"),
            Self::ConnectFailed => f.write_str("Could not connect to BLDS"),
            Self::Disconnected => f.write_str("Disconnected from BLDS"),
            Self::ConnectCanceled => f.write_str("Pending connection to BLDS canceled"),
            Self::SourceCreated => f.write_str("Data source created"),
            Self::SourceDeleted => f.write_str("Data source deleted"),
            Self::RecordingStarted => f.write_str("Recording started"),
            Self::RecordingStopped => f.write_str("Recording stopped"),
            Self::FilenameSet(name) => write!(f, "Recording filename set to {name}"),
            Self::LengthChanged(length) => write!(f, "Recording length changed to {length}"),
            Self::SaveDirectorySet(dir) => write!(f, "Save directory set to {dir}"),
            Self::AdcRangeChanged(range) => write!(f, "ADC range changed to {range:.1}"),
            Self::TriggerSet(trigger) => write!(f, "Trigger set to {trigger}"),
            Self::PlugSet(plug) => write!(f, "Plug set to {plug}"),
            Self::ConfigurationRead(file) => write!(f, "Configuration read from {file}"),
            Self::AnalogOutputRead(file) => write!(f, "Analog output read from {file}"),
            Self::AnalogOutputCleared => f.write_str("Analog output cleared"),
        }
    }
}

/// How serious a dialog is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The request failed; the session carries on
    Warning,
    /// The session or window was closed
    Critical,
}

/// A modal message box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Dialog {
    /// A warning dialog.
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    /// A critical dialog.
    pub fn critical(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Critical,
            title: title.into(),
            message: message.into(),
        }
    }

    /// The dialog shown when the session with the BLDS breaks.
    pub fn session_error(error: &str) -> Self {
        Self::critical(
            SESSION_ERROR_TITLE,
            format!("An error occurred communicating with the BLDS:\n\n{error}"),
        )
    }
}
