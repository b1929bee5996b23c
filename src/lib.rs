//! # meactl
//!
//! Desktop control panel for the Baccus Lab Data Server (BLDS). The panel
//! connects to a BLDS, creates or deletes its data source, configures and
//! runs recordings, and edits the source's acquisition settings.
//!
//! ## Crate Structure
//!
//! - **`session`**: The pure session state machine. Given a snapshot and an
//!   event it returns the next snapshot and the effects to perform.
//! - **`controller`**: Runs the state machine against a live
//!   [`blds_client::BldsClient`] on a tokio runtime and drives the
//!   recording-status poll.
//! - **`source_settings`**: The source settings panel, with its own session,
//!   optimistic edits and rollback on rejection.
//! - **`analog_output`**: Reads stimulus waveforms from HDF5 files.
//! - **`config`**: Layered configuration (defaults, TOML file, environment).
//! - **`logging`**: `tracing` subscriber setup.
//! - **`gui`**: The egui/eframe front end.
//! - **`error`**: Application-level error type.

pub mod analog_output;
pub mod config;
pub mod controller;
pub mod error;
pub mod gui;
pub mod logging;
pub mod session;
pub mod source_settings;

pub use error::{AppResult, MeactlError};
