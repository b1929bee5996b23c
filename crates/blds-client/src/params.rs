//! Named parameters and the values exchanged with the BLDS.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

/// Kind of data source the BLDS can manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Replay of a previously recorded file
    #[default]
    File,
    /// HiDens hardware rig
    Hidens,
    /// Multichannel Systems acquisition device
    Mcs,
}

impl SourceType {
    /// All source types, in the order shown to the user.
    pub const ALL: [SourceType; 3] = [Self::File, Self::Hidens, Self::Mcs];

    /// Wire name of this source type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Hidens => "hidens",
            Self::Mcs => "mcs",
        }
    }

    /// Whether sources of this type are created from a user-supplied location.
    #[must_use]
    pub fn takes_location(self) -> bool {
        !matches!(self, Self::Mcs)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "hidens" => Ok(Self::Hidens),
            "mcs" => Ok(Self::Mcs),
            other => Err(ClientError::Malformed(format!("unknown source type '{other}'"))),
        }
    }
}

/// Recording trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Start immediately
    #[default]
    None,
    /// Wait for the photodiode
    Photodiode,
}

impl Trigger {
    /// All triggers, in the order shown to the user.
    pub const ALL: [Trigger; 2] = [Self::None, Self::Photodiode];

    /// Wire name of this trigger.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Photodiode => "photodiode",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "photodiode" => Ok(Self::Photodiode),
            other => Err(ClientError::Rejected(format!("Unknown trigger '{other}'"))),
        }
    }
}

/// Server-level parameters, addressed with `get`/`set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerParam {
    RecordingLength,
    SaveFile,
    SaveDirectory,
    RecordingExists,
    RecordingPosition,
    SourceExists,
}

impl ServerParam {
    /// Wire name of this parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RecordingLength => "recording-length",
            Self::SaveFile => "save-file",
            Self::SaveDirectory => "save-directory",
            Self::RecordingExists => "recording-exists",
            Self::RecordingPosition => "recording-position",
            Self::SourceExists => "source-exists",
        }
    }

    /// Whether clients may write this parameter.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::RecordingLength | Self::SaveFile | Self::SaveDirectory
        )
    }
}

impl fmt::Display for ServerParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data-source parameters, addressed with `get_source`/`set_source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceParam {
    AdcRange,
    Trigger,
    Plug,
    ConfigurationFile,
    AnalogOutput,
}

impl SourceParam {
    /// Wire name of this parameter.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdcRange => "adc-range",
            Self::Trigger => "trigger",
            Self::Plug => "plug",
            Self::ConfigurationFile => "configuration-file",
            Self::AnalogOutput => "analog-output",
        }
    }
}

impl fmt::Display for SourceParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter value as carried in requests and replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Samples(Vec<f64>),
}

impl ParamValue {
    /// Interpret as a boolean.
    pub fn as_bool(&self) -> Result<bool, ClientError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }

    /// Interpret as an integer. Floats with no fractional part are accepted.
    pub fn as_int(&self) -> Result<i64, ClientError> {
        match self {
            Self::Int(i) => Ok(*i),
            Self::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
            other => Err(mismatch("integer", other)),
        }
    }

    /// Interpret as a float. Integers are widened.
    pub fn as_f64(&self) -> Result<f64, ClientError> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(i) => Ok(*i as f64),
            other => Err(mismatch("number", other)),
        }
    }

    /// Interpret as text.
    pub fn as_text(&self) -> Result<&str, ClientError> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(mismatch("string", other)),
        }
    }

    /// Interpret as a sample vector.
    pub fn as_samples(&self) -> Result<&[f64], ClientError> {
        match self {
            Self::Samples(v) => Ok(v),
            other => Err(mismatch("sample array", other)),
        }
    }
}

fn mismatch(expected: &str, got: &ParamValue) -> ClientError {
    ClientError::Malformed(format!("expected {expected}, got {got:?}"))
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Samples(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_names() {
        for ty in SourceType::ALL {
            assert_eq!(ty.as_str().parse::<SourceType>().unwrap(), ty);
        }
        assert!("camera".parse::<SourceType>().is_err());
        assert!(!SourceType::Mcs.takes_location());
        assert!(SourceType::File.takes_location());
    }

    #[test]
    fn test_param_names_are_kebab_case() {
        assert_eq!(ServerParam::RecordingLength.as_str(), "recording-length");
        assert_eq!(ServerParam::SaveFile.as_str(), "save-file");
        assert_eq!(SourceParam::ConfigurationFile.as_str(), "configuration-file");
        assert_eq!(SourceParam::AnalogOutput.to_string(), "analog-output");
    }

    #[test]
    fn test_only_recording_settings_are_writable() {
        assert!(ServerParam::RecordingLength.is_writable());
        assert!(ServerParam::SaveDirectory.is_writable());
        assert!(!ServerParam::RecordingExists.is_writable());
        assert!(!ServerParam::RecordingPosition.is_writable());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(ParamValue::Int(3).as_f64().unwrap(), 3.0);
        assert_eq!(ParamValue::Float(1000.0).as_int().unwrap(), 1000);
        assert!(ParamValue::Float(1.5).as_int().is_err());
        assert!(ParamValue::Text("x".into()).as_bool().is_err());
        assert_eq!(ParamValue::from("none").as_text().unwrap(), "none");
    }

    #[test]
    fn test_untagged_json_shape() {
        let v: ParamValue = serde_json::from_str("[0.5, -0.5]").unwrap();
        assert_eq!(v.as_samples().unwrap(), &[0.5, -0.5]);
        let v: ParamValue = serde_json::from_str("true").unwrap();
        assert!(v.as_bool().unwrap());
    }
}
