//! Recording parameters and the data-source descriptor.

use blds_client::{ServerStatus, SourceType};

/// Shortest recording the server accepts, in seconds.
pub const MIN_RECORDING_LENGTH: u32 = 1;
/// Longest recording the server accepts, in seconds.
pub const MAX_RECORDING_LENGTH: u32 = blds_client::MAX_RECORDING_LENGTH;
/// Recording length shown before the server reports one.
pub const DEFAULT_RECORDING_LENGTH: u32 = 1000;

/// Parse a recording length typed by the user.
pub fn parse_recording_length(input: &str) -> Result<u32, String> {
    input
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|l| (MIN_RECORDING_LENGTH..=MAX_RECORDING_LENGTH).contains(l))
        .ok_or_else(|| {
            format!(
                "The recording length must be a whole number of seconds between {MIN_RECORDING_LENGTH} and {MAX_RECORDING_LENGTH}"
            )
        })
}

/// Recording settings and progress as shown in the main panel.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingParams {
    /// Recording length in seconds
    pub length: u32,
    pub save_directory: String,
    pub save_filename: String,
    /// Seconds recorded so far; server-authoritative
    pub position: f64,
}

impl RecordingParams {
    /// Parameters as shown while disconnected.
    #[must_use]
    pub fn new(default_length: u32) -> Self {
        Self {
            length: default_length,
            save_directory: String::new(),
            save_filename: String::new(),
            position: 0.0,
        }
    }

    /// Position formatted for display, one decimal.
    #[must_use]
    pub fn position_text(&self) -> String {
        format!("{:.1}", self.position)
    }

    /// Copy the recording fields from a server status.
    pub fn apply_status(&mut self, status: &ServerStatus) {
        self.length = status.recording_length;
        self.save_directory = status.save_directory.clone();
        self.save_filename = status.save_file.clone();
        self.position = if status.recording_exists {
            status.recording_position
        } else {
            0.0
        };
    }

    /// Current value of one editable field.
    #[must_use]
    pub fn field(&self, key: RecordingKey) -> RecordingField {
        match key {
            RecordingKey::Length => RecordingField::Length(self.length),
            RecordingKey::SaveFile => RecordingField::SaveFile(self.save_filename.clone()),
            RecordingKey::SaveDirectory => {
                RecordingField::SaveDirectory(self.save_directory.clone())
            }
        }
    }

    /// Overwrite one editable field.
    pub fn apply(&mut self, field: RecordingField) {
        match field {
            RecordingField::Length(length) => self.length = length,
            RecordingField::SaveFile(file) => self.save_filename = file,
            RecordingField::SaveDirectory(dir) => self.save_directory = dir,
        }
    }
}

/// Recording parameters the user can edit from the main panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingKey {
    Length,
    SaveFile,
    SaveDirectory,
}

impl RecordingKey {
    /// The server parameter behind this field.
    #[must_use]
    pub fn server_param(self) -> blds_client::ServerParam {
        match self {
            Self::Length => blds_client::ServerParam::RecordingLength,
            Self::SaveFile => blds_client::ServerParam::SaveFile,
            Self::SaveDirectory => blds_client::ServerParam::SaveDirectory,
        }
    }
}

/// A value for one of the [`RecordingKey`] fields.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingField {
    Length(u32),
    SaveFile(String),
    SaveDirectory(String),
}

impl RecordingField {
    /// Which field this value belongs to.
    #[must_use]
    pub fn key(&self) -> RecordingKey {
        match self {
            Self::Length(_) => RecordingKey::Length,
            Self::SaveFile(_) => RecordingKey::SaveFile,
            Self::SaveDirectory(_) => RecordingKey::SaveDirectory,
        }
    }

    /// The value as sent to the server.
    #[must_use]
    pub fn to_param_value(&self) -> blds_client::ParamValue {
        match self {
            Self::Length(length) => (*length).into(),
            Self::SaveFile(file) => file.as_str().into(),
            Self::SaveDirectory(dir) => dir.as_str().into(),
        }
    }
}

/// Kind and location of the data source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceDescriptor {
    pub source_type: SourceType,
    /// File path or device name; unused for `mcs`
    pub location: String,
}

impl SourceDescriptor {
    /// Location to send when creating the source.
    #[must_use]
    pub fn effective_location(&self) -> &str {
        if self.source_type.takes_location() {
            self.location.trim()
        } else {
            ""
        }
    }

    /// Check that a source can be created from this descriptor.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_type.takes_location() && self.location.trim().is_empty() {
            return Err(format!(
                "A location is required to create a {} source",
                self.source_type
            ));
        }
        Ok(())
    }

    /// Copy source type and location from a server status.
    pub fn apply_status(&mut self, status: &ServerStatus) {
        if let Some(source_type) = status.source_type {
            self.source_type = source_type;
        }
        self.location = status.source_location.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recording_length() {
        assert_eq!(parse_recording_length("1200"), Ok(1200));
        assert_eq!(parse_recording_length(" 1 "), Ok(1));
        assert_eq!(parse_recording_length("50000"), Ok(50_000));
        assert!(parse_recording_length("0").is_err());
        assert!(parse_recording_length("50001").is_err());
        assert!(parse_recording_length("12.5").is_err());
        assert!(parse_recording_length("").is_err());
    }

    #[test]
    fn test_position_has_one_decimal() {
        let mut params = RecordingParams::new(1000);
        assert_eq!(params.position_text(), "0.0");
        params.position = 12.345;
        assert_eq!(params.position_text(), "12.3");
    }

    #[test]
    fn test_apply_status_resets_position_without_recording() {
        let mut params = RecordingParams::new(1000);
        params.position = 42.0;
        let status = ServerStatus {
            recording_length: 600,
            save_file: "a.h5".into(),
            recording_position: 17.0,
            ..Default::default()
        };
        params.apply_status(&status);
        assert_eq!(params.length, 600);
        assert_eq!(params.save_filename, "a.h5");
        assert_eq!(params.position, 0.0);
    }

    #[test]
    fn test_field_round_trip() {
        let mut params = RecordingParams::new(1000);
        let prior = params.field(RecordingKey::Length);
        params.apply(RecordingField::Length(20));
        assert_eq!(params.length, 20);
        params.apply(prior);
        assert_eq!(params.length, 1000);
    }

    #[test]
    fn test_mcs_needs_no_location() {
        let desc = SourceDescriptor {
            source_type: SourceType::Mcs,
            location: "ignored".into(),
        };
        assert!(desc.validate().is_ok());
        assert_eq!(desc.effective_location(), "");

        let desc = SourceDescriptor {
            source_type: SourceType::File,
            location: "  ".into(),
        };
        assert!(desc.validate().is_err());
    }
}
