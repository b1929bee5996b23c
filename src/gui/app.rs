//! The eframe application.

use eframe::egui;
use std::sync::Arc;
use std::time::Duration;

use blds_client::{resolve_address, Connector, STORAGE_KEY_SERVER_HOST};

use super::controls::{self, PanelRequest};
use super::dialogs::DialogQueue;
use super::settings_window::SettingsWindow;
use super::status_bar::StatusBar;
use crate::config::MeactlConfig;
use crate::controller::{ControllerSettings, SessionController};
use crate::session::Notification;
use crate::source_settings::SourceSettingsPanel;

/// Repaint interval while requests or polls may complete in the background.
const BACKGROUND_REPAINT: Duration = Duration::from_millis(100);

/// Main window: controller, optional settings window, status bar and dialogs.
pub struct MeactlApp {
    runtime: tokio::runtime::Runtime,
    connector: Arc<dyn Connector>,
    controller: SessionController,
    settings: Option<SettingsWindow>,
    status_bar: StatusBar,
    dialogs: DialogQueue,
}

impl MeactlApp {
    /// Build the application.
    ///
    /// `host` comes from the command line and wins over the host persisted
    /// from the previous run, which in turn wins over the configured one.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: tokio::runtime::Runtime,
        connector: Arc<dyn Connector>,
        config: &MeactlConfig,
        host: Option<String>,
    ) -> Self {
        let persisted = cc
            .storage
            .and_then(|s| s.get_string(STORAGE_KEY_SERVER_HOST))
            .or_else(|| config.server.host.clone());
        let address = resolve_address(host.as_deref(), persisted.as_deref());
        tracing::info!(
            "Initial BLDS address: {} ({})",
            address,
            address.source().label()
        );

        let controller = SessionController::new(
            runtime.handle().clone(),
            Arc::clone(&connector),
            ControllerSettings::from(config),
            address.original(),
        );

        Self {
            runtime,
            connector,
            controller,
            settings: None,
            status_bar: StatusBar::new(config.status_timeout()),
            dialogs: DialogQueue::default(),
        }
    }

    fn pump(&mut self) {
        self.controller.update();
        let mut notifications = self.controller.take_notifications();
        self.dialogs.extend(self.controller.take_dialogs());

        if let Some(window) = &mut self.settings {
            let panel = window.panel_mut();
            panel.update();
            notifications.extend(panel.take_notifications());
            self.dialogs.extend(panel.take_dialogs());
            if !window.is_open() {
                self.settings = None;
            }
        }

        if let Some(last) = notifications.last() {
            self.status_bar.set_status(last.to_string());
        }
        // A new session invalidates any settings window opened against the old one.
        if notifications.contains(&Notification::Disconnected) {
            self.settings = None;
        }
    }

    fn open_settings(&mut self) {
        if self.settings.as_ref().is_some_and(SettingsWindow::is_open) {
            return;
        }
        if let Some(address) = self.controller.settings_address() {
            let panel = SourceSettingsPanel::open(
                self.runtime.handle().clone(),
                Arc::clone(&self.connector),
                address,
            );
            self.settings = Some(SettingsWindow::new(panel));
        }
    }
}

impl eframe::App for MeactlApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.pump();

        self.status_bar.show(ctx, self.controller.state());

        let modal = self.dialogs.is_open();
        let request = egui::CentralPanel::default()
            .show(ctx, |ui| {
                ui.add_enabled_ui(!modal, |ui| controls::show(ui, &mut self.controller))
                    .inner
            })
            .inner;
        if request == Some(PanelRequest::OpenSettings) {
            self.open_settings();
        }

        if let Some(window) = &mut self.settings {
            window.show(ctx, !modal);
        }

        self.dialogs.show(ctx);

        if self.controller.is_busy()
            || self.controller.state().is_connected()
            || self.settings.is_some()
        {
            ctx.request_repaint_after(BACKGROUND_REPAINT);
        }
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let host = self
            .controller
            .address()
            .map_or_else(|| self.controller.host_input().to_string(), |a| a.original().to_string());
        storage.set_string(STORAGE_KEY_SERVER_HOST, host);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(window) = &mut self.settings {
            window.panel_mut().close();
        }
        self.controller.shutdown();
        tracing::info!("meactl exiting");
    }
}
