//! Queued message boxes, shown one at a time.

use eframe::egui;
use std::collections::VecDeque;

use crate::session::{Dialog, Severity};

/// Dialogs waiting to be acknowledged.
#[derive(Default)]
pub struct DialogQueue {
    queue: VecDeque<Dialog>,
}

impl DialogQueue {
    /// Queue dialogs after any already waiting.
    pub fn extend(&mut self, dialogs: impl IntoIterator<Item = Dialog>) {
        self.queue.extend(dialogs);
    }

    /// Whether a dialog is on screen.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Render the oldest dialog; it is removed when acknowledged.
    pub fn show(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.queue.front() else {
            return;
        };

        let (prefix, color) = match dialog.severity {
            Severity::Warning => ("Warning: ", egui::Color32::YELLOW),
            Severity::Critical => ("Error: ", egui::Color32::LIGHT_RED),
        };

        let mut acknowledged = false;
        egui::Window::new(&dialog.title)
            .id(egui::Id::new("meactl_dialog"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.colored_label(color, format!("{prefix}{}", dialog.title));
                ui.separator();
                ui.label(&dialog.message);
                ui.add_space(8.0);
                ui.vertical_centered(|ui| {
                    if ui.button("OK").clicked() {
                        acknowledged = true;
                    }
                });
            });

        if acknowledged {
            self.queue.pop_front();
        }
    }
}
