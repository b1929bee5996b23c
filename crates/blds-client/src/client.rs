//! The session contract the control panel requires from a BLDS client.
//!
//! A [`Connector`] opens sessions; each session is an `Arc<dyn BldsClient>`
//! that can be cloned into spawned tasks. Every request resolves exactly once
//! through its own future, so callers never have to demultiplex replies by
//! parameter name.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::connection::ServerAddress;
use crate::error::Result;
use crate::params::{ParamValue, ServerParam, SourceParam, SourceType};
use crate::status::{ServerStatus, SourceStatus};

/// One open session with the BLDS.
#[async_trait]
pub trait BldsClient: Send + Sync {
    /// Address this session is connected to.
    fn address(&self) -> &ServerAddress;

    /// Close the session. Later requests fail with `ClientError::Disconnected`.
    async fn disconnect(&self) -> Result<()>;

    /// Ask the server to create a data source.
    async fn create_source(&self, source_type: SourceType, location: &str) -> Result<()>;

    /// Ask the server to delete the current data source.
    async fn delete_source(&self) -> Result<()>;

    /// Start recording from the current source.
    async fn start_recording(&self) -> Result<()>;

    /// Stop the current recording.
    async fn stop_recording(&self) -> Result<()>;

    /// Read a server parameter.
    async fn get(&self, param: ServerParam) -> Result<ParamValue>;

    /// Write a server parameter.
    async fn set(&self, param: ServerParam, value: ParamValue) -> Result<()>;

    /// Read a data-source parameter.
    async fn get_source(&self, param: SourceParam) -> Result<ParamValue>;

    /// Write a data-source parameter.
    async fn set_source(&self, param: SourceParam, value: ParamValue) -> Result<()>;

    /// Full server status.
    async fn server_status(&self) -> Result<ServerStatus>;

    /// Status of the data source, including its parameters.
    async fn source_status(&self) -> Result<SourceStatus>;

    /// Out-of-band channel for fatal session errors (transport failure,
    /// server shutdown). Per-request failures are never sent here.
    fn subscribe_errors(&self) -> broadcast::Receiver<String>;
}

/// Factory for sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new, independent session to `address`.
    async fn connect(&self, address: &ServerAddress) -> Result<Arc<dyn BldsClient>>;
}
