//! Client-side contract for the Baccus Lab Data Server (BLDS).
//!
//! The control panel never talks to a socket directly. It depends on the
//! [`BldsClient`] and [`Connector`] traits defined here, together with the
//! parameter and status types that travel across them. The networked client
//! lives outside this workspace; [`sim`] provides an in-process server that
//! implements the same contract for development and tests.
//!
//! ```no_run
//! use blds_client::{Connector, ServerAddress, SimulatedServer, AddressSource};
//!
//! # async fn demo() -> blds_client::Result<()> {
//! let server = SimulatedServer::new();
//! let address = ServerAddress::parse("localhost", AddressSource::Default)
//!     .map_err(|e| blds_client::ClientError::Connection(e.to_string()))?;
//! let session = server.connector().connect(&address).await?;
//! let status = session.server_status().await?;
//! println!("source exists: {}", status.source_exists);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod params;
pub mod sim;
pub mod status;

pub use client::{BldsClient, Connector};
pub use connection::{
    normalize_address, resolve_address, AddressError, AddressSource, ServerAddress,
    BLDS_HOST_ENV, DEFAULT_BLDS_HOST, DEFAULT_BLDS_PORT, STORAGE_KEY_SERVER_HOST,
};
pub use error::{ClientError, Result};
pub use params::{ParamValue, ServerParam, SourceParam, SourceType, Trigger};
pub use sim::{SimConfig, SimulatedConnector, SimulatedServer, MAX_RECORDING_LENGTH};
pub use status::{ServerStatus, SourceStatus};
