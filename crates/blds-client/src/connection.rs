//! Server address parsing and resolution.
//!
//! - [`ServerAddress`]: validated BLDS host and port with source tracking
//! - [`AddressSource`]: where the address configuration came from
//! - [`AddressError`]: user-facing validation errors
//!
//! # Address Resolution Precedence
//!
//! 1. User input (typed in the host field)
//! 2. Persisted from the previous session
//! 3. `BLDS_HOST` environment variable
//! 4. Default: `localhost:12345`
//!
//! # Example
//!
//! ```
//! use blds_client::connection::{AddressSource, ServerAddress};
//!
//! let addr = ServerAddress::parse("10.0.0.7", AddressSource::UserInput)?;
//! assert_eq!(addr.host(), "10.0.0.7");
//! assert_eq!(addr.port(), 12345);
//! # Ok::<(), blds_client::connection::AddressError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Storage key for the persisted server host.
pub const STORAGE_KEY_SERVER_HOST: &str = "blds_host";

/// Default TCP port the BLDS listens on.
pub const DEFAULT_BLDS_PORT: u16 = 12345;

/// Default host when nothing else is configured.
pub const DEFAULT_BLDS_HOST: &str = "localhost";

/// Environment variable consulted during address resolution.
pub const BLDS_HOST_ENV: &str = "BLDS_HOST";

/// Source of the server address configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressSource {
    /// Hardcoded default
    Default,
    /// Loaded from the `BLDS_HOST` environment variable
    Environment,
    /// Restored from the previous session
    Persisted,
    /// Typed by the user
    UserInput,
}

impl AddressSource {
    /// Returns a short label for display in the UI.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Environment => "env",
            Self::Persisted => "saved",
            Self::UserInput => "user",
        }
    }
}

/// Validated server address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    host: String,
    port: u16,
    source: AddressSource,
    /// Original input string, shown back in the host field
    original: String,
}

impl ServerAddress {
    /// Parse and normalize a server address.
    ///
    /// Accepts `host`, `host:port`, `[v6]:port` and `tcp://host:port`.
    pub fn parse(input: &str, source: AddressSource) -> Result<Self, AddressError> {
        let url = normalize_address(input)?;
        let host = url
            .host_str()
            .ok_or(AddressError::MissingHost)?
            .to_string();
        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_BLDS_PORT),
            source,
            original: input.trim().to_string(),
        })
    }

    /// Hostname or IP address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Where this address came from.
    #[must_use]
    pub fn source(&self) -> AddressSource {
        self.source
    }

    /// The input string before normalization.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self {
            host: DEFAULT_BLDS_HOST.to_string(),
            port: DEFAULT_BLDS_PORT,
            source: AddressSource::Default,
            original: DEFAULT_BLDS_HOST.to_string(),
        }
    }
}

/// Address validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Input was empty or whitespace-only
    EmptyInput,
    /// Parsing failed
    InvalidAddress(String),
    /// No host was found
    MissingHost,
    /// Port could not be applied
    InvalidPort(String),
    /// Only `tcp://` is accepted as an explicit scheme
    UnsupportedScheme(String),
}

impl std::error::Error for AddressError {}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "Hostname cannot be empty"),
            Self::InvalidAddress(e) => write!(f, "Invalid address: {e}"),
            Self::MissingHost => write!(f, "Address must include a host"),
            Self::InvalidPort(e) => write!(f, "Invalid port: {e}"),
            Self::UnsupportedScheme(s) => write!(f, "Unsupported scheme '{s}' (use tcp)"),
        }
    }
}

/// Normalize an address string into a `tcp://host:port` URL.
pub fn normalize_address(input: &str) -> Result<Url, AddressError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(AddressError::EmptyInput);
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("tcp://{input}")
    };

    let mut url =
        Url::parse(&with_scheme).map_err(|e| AddressError::InvalidAddress(e.to_string()))?;

    let scheme = url.scheme().to_lowercase();
    if scheme != "tcp" {
        return Err(AddressError::UnsupportedScheme(scheme));
    }

    match url.host_str() {
        None => return Err(AddressError::MissingHost),
        Some(h) if h.is_empty() => return Err(AddressError::MissingHost),
        Some(_) => {}
    }

    if url.port().is_none() {
        url.set_port(Some(DEFAULT_BLDS_PORT))
            .map_err(|()| AddressError::InvalidPort("Cannot set port on this address".into()))?;
    }

    Ok(url)
}

/// Resolve the server address from multiple sources. Never fails.
pub fn resolve_address(user_input: Option<&str>, persisted: Option<&str>) -> ServerAddress {
    if let Some(input) = user_input {
        if let Ok(addr) = ServerAddress::parse(input, AddressSource::UserInput) {
            return addr;
        }
    }

    if let Some(persisted) = persisted {
        if let Ok(addr) = ServerAddress::parse(persisted, AddressSource::Persisted) {
            return addr;
        }
    }

    if let Ok(env_host) = std::env::var(BLDS_HOST_ENV) {
        if let Ok(addr) = ServerAddress::parse(&env_host, AddressSource::Environment) {
            return addr;
        }
    }

    ServerAddress::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_bare_host() {
        let addr = ServerAddress::parse("localhost", AddressSource::UserInput).unwrap();
        assert_eq!(addr.host(), "localhost");
        assert_eq!(addr.port(), DEFAULT_BLDS_PORT);
        assert_eq!(addr.to_string(), "localhost:12345");
    }

    #[test]
    fn test_parse_host_port() {
        let addr = ServerAddress::parse("192.168.1.20:9000", AddressSource::UserInput).unwrap();
        assert_eq!(addr.host(), "192.168.1.20");
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn test_parse_with_scheme_and_whitespace() {
        let addr = ServerAddress::parse("  tcp://rig-01:4000 ", AddressSource::UserInput).unwrap();
        assert_eq!(addr.host(), "rig-01");
        assert_eq!(addr.port(), 4000);
        assert_eq!(addr.original(), "tcp://rig-01:4000");
    }

    #[test]
    fn test_parse_ipv6() {
        let addr = ServerAddress::parse("[::1]:8080", AddressSource::UserInput).unwrap();
        assert_eq!(addr.host(), "[::1]");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_address("   ").unwrap_err(), AddressError::EmptyInput);
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = normalize_address("http://localhost").unwrap_err();
        assert!(matches!(err, AddressError::UnsupportedScheme(_)));
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn test_default_address() {
        let addr = ServerAddress::default();
        assert_eq!(addr.to_string(), "localhost:12345");
        assert_eq!(addr.source(), AddressSource::Default);
    }

    #[test]
    #[serial]
    fn test_resolve_default() {
        std::env::remove_var(BLDS_HOST_ENV);
        let addr = resolve_address(None, None);
        assert_eq!(addr.source(), AddressSource::Default);
    }

    #[test]
    #[serial]
    fn test_resolve_env() {
        std::env::set_var(BLDS_HOST_ENV, "blds.lab:7000");
        let addr = resolve_address(None, None);
        assert_eq!(addr.host(), "blds.lab");
        assert_eq!(addr.source(), AddressSource::Environment);
        std::env::remove_var(BLDS_HOST_ENV);
    }

    #[test]
    #[serial]
    fn test_resolve_precedence() {
        std::env::set_var(BLDS_HOST_ENV, "env-host");
        let addr = resolve_address(Some("typed-host"), Some("saved-host"));
        assert_eq!(addr.source(), AddressSource::UserInput);

        let addr = resolve_address(Some(""), Some("saved-host"));
        assert_eq!(addr.host(), "saved-host");
        assert_eq!(addr.source(), AddressSource::Persisted);
        std::env::remove_var(BLDS_HOST_ENV);
    }
}
