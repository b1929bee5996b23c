//! The eframe/egui shell.
//!
//! Renders the controller and the settings window, forwards notifications to
//! the status bar and queues dialogs. Holds no session state of its own.

mod app;
mod controls;
mod dialogs;
mod settings_window;
mod status_bar;

pub use app::MeactlApp;

/// Title of the main window.
pub const WINDOW_TITLE: &str = "MEA controller";
