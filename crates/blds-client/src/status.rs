//! Status snapshots reported by the BLDS.
//!
//! The server reports status as a flat JSON object with kebab-case keys.
//! Both structs deserialize directly from that object; missing keys fall
//! back to defaults since older servers omit fields they do not track.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::params::{SourceType, Trigger};

/// Server-wide status: source, recording and save location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServerStatus {
    pub source_exists: bool,
    pub source_type: Option<SourceType>,
    pub source_location: String,
    pub recording_exists: bool,
    /// Total length of the recording in seconds
    pub recording_length: u32,
    /// Seconds recorded so far
    pub recording_position: f64,
    pub save_file: String,
    pub save_directory: String,
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self {
            source_exists: false,
            source_type: None,
            source_location: String::new(),
            recording_exists: false,
            recording_length: 1000,
            recording_position: 0.0,
            save_file: String::new(),
            save_directory: String::new(),
        }
    }
}

impl ServerStatus {
    /// Parse a status object as sent by the server.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ClientError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Status of the data source and its acquisition parameters.
///
/// Parameters the current source type does not support are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct SourceStatus {
    /// False when there is no source; every other field is then meaningless.
    pub exists: bool,
    pub source_type: Option<SourceType>,
    pub location: String,
    /// ADC voltage range in volts
    pub adc_range: Option<f64>,
    pub trigger: Option<Trigger>,
    pub plug: Option<u32>,
    pub configuration_file: Option<String>,
    /// True when some client has already loaded an analog-output waveform
    pub has_analog_output: bool,
}

impl SourceStatus {
    /// Parse a source status object as sent by the server.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ClientError> {
        Ok(serde_json::from_value(value)?)
    }
}
