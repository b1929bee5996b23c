//! Application error type.
//!
//! `MeactlError` collects the failures that can reach the top of the
//! application: configuration problems, I/O, BLDS session errors and
//! analog-output file errors. Request-level rejections from the server are
//! not errors at this level; the controller turns them into dialogs and
//! keeps running.

use blds_client::{AddressError, ClientError};
use thiserror::Error;

use crate::analog_output::AnalogOutputError;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, MeactlError>;

/// Errors surfaced by the application.
#[derive(Error, Debug)]
pub enum MeactlError {
    /// The configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The configuration parsed but holds invalid values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The BLDS session failed.
    #[error("BLDS error: {0}")]
    Client(#[from] ClientError),

    /// A host string could not be turned into a server address.
    #[error("Invalid server address: {0}")]
    Address(#[from] AddressError),

    /// An analog-output file could not be read.
    #[error(transparent)]
    AnalogOutput(#[from] AnalogOutputError),

    /// Logging could not be initialised.
    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<figment::Error> for MeactlError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
