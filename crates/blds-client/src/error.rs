//! Client error types.

use thiserror::Error;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the BLDS.
///
/// Errors fall in two tiers. [`ClientError::Rejected`] is a request-level
/// failure: the server understood the request and refused it, and the
/// session is still usable. Every other variant means the session itself is
/// broken and must be torn down (see [`ClientError::is_session_error`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The server refused a request and supplied a reason.
    #[error("{0}")]
    Rejected(String),

    /// Connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The transport failed mid-session.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The session was closed before the request completed.
    #[error("Not connected to the BLDS")]
    Disconnected,

    /// Timeout waiting for a reply.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A reply did not have the expected shape.
    #[error("Malformed reply: {0}")]
    Malformed(String),
}

impl ClientError {
    /// Returns true if this error ends the session rather than a single request.
    #[must_use]
    pub fn is_session_error(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// Returns the message to show the user for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
