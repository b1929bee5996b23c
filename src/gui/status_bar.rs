//! Status bar with transient messages.

use eframe::egui;
use std::time::{Duration, Instant};

use crate::session::SessionState;

/// A transient status message.
#[derive(Debug, Clone)]
struct StatusMessage {
    text: String,
    created_at: Instant,
}

/// Bottom status bar: the latest notification on the left, the session
/// state on the right. Messages clear themselves after a timeout.
pub struct StatusBar {
    message: Option<StatusMessage>,
    timeout: Duration,
}

impl StatusBar {
    /// Create a status bar whose messages last `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            message: None,
            timeout,
        }
    }

    /// Show `text`, replacing any current message.
    pub fn set_status(&mut self, text: impl Into<String>) {
        self.message = Some(StatusMessage {
            text: text.into(),
            created_at: Instant::now(),
        });
    }

    /// The message currently shown, if it has not expired.
    #[must_use]
    pub fn current(&self, now: Instant) -> Option<&str> {
        self.message
            .as_ref()
            .filter(|m| now.duration_since(m.created_at) < self.timeout)
            .map(|m| m.text.as_str())
    }

    fn check_expiry(&mut self) {
        if self.current(Instant::now()).is_none() {
            self.message = None;
        }
    }

    /// Render the status bar.
    pub fn show(&mut self, ctx: &egui::Context, state: SessionState) {
        self.check_expiry();

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(msg) = &self.message {
                    ui.label(&msg.text);
                    ui.ctx().request_repaint_after(self.timeout);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let color = match state {
                        SessionState::Disconnected => egui::Color32::GRAY,
                        SessionState::Connecting => egui::Color32::YELLOW,
                        SessionState::RecordingActive => egui::Color32::LIGHT_RED,
                        _ => egui::Color32::LIGHT_GREEN,
                    };
                    ui.label(egui::RichText::new(state.to_string()).small().color(color));
                });
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_expires() {
        let mut bar = StatusBar::new(Duration::from_secs(5));
        bar.set_status("Connected to BLDS");
        let now = Instant::now();
        assert_eq!(bar.current(now), Some("Connected to BLDS"));
        assert_eq!(bar.current(now + Duration::from_secs(6)), None);
    }

    #[test]
    fn test_new_message_replaces_old() {
        let mut bar = StatusBar::new(Duration::from_secs(5));
        bar.set_status("Recording started");
        bar.set_status("Recording stopped");
        assert_eq!(bar.current(Instant::now()), Some("Recording stopped"));
    }
}
