//! Main panel: Server, Data source and Recording groups.

use eframe::egui;

use blds_client::SourceType;

use crate::controller::SessionController;
use crate::session::{Action, Affordances, SessionState};

/// Something the main panel asks the shell to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelRequest {
    OpenSettings,
}

/// Render the main panel.
pub fn show(ui: &mut egui::Ui, controller: &mut SessionController) -> Option<PanelRequest> {
    let allowed = controller.affordances();
    let state = controller.state();

    server_group(ui, controller, allowed, state);
    ui.add_space(6.0);
    let request = source_group(ui, controller, allowed, state);
    ui.add_space(6.0);
    recording_group(ui, controller, allowed, state);

    request
}

fn entered(ui: &egui::Ui, response: &egui::Response) -> bool {
    response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter))
}

fn server_group(
    ui: &mut egui::Ui,
    controller: &mut SessionController,
    allowed: Affordances,
    state: SessionState,
) {
    ui.group(|ui| {
        ui.label(egui::RichText::new("Server").strong());
        ui.horizontal(|ui| {
            ui.label("Host:");
            let host = ui.add_enabled(
                allowed.allows(Action::EditHost),
                egui::TextEdit::singleline(controller.host_input_mut()).desired_width(180.0),
            );
            let connect_now = entered(ui, &host);

            let action = match state {
                SessionState::Disconnected => Action::Connect,
                SessionState::Connecting => Action::Cancel,
                _ => Action::Disconnect,
            };
            let clicked = ui
                .add_enabled(
                    allowed.allows(action),
                    egui::Button::new(state.connect_button_label()),
                )
                .clicked();

            if clicked || (connect_now && action == Action::Connect) {
                match action {
                    Action::Connect => controller.connect(),
                    Action::Cancel => controller.cancel(),
                    _ => controller.disconnect(),
                }
            }
            if state == SessionState::Connecting {
                ui.spinner();
            }
        });
    });
}

fn source_group(
    ui: &mut egui::Ui,
    controller: &mut SessionController,
    allowed: Affordances,
    state: SessionState,
) -> Option<PanelRequest> {
    let mut request = None;
    ui.group(|ui| {
        ui.label(egui::RichText::new("Data source").strong());
        let editable = allowed.allows(Action::EditSource);

        egui::Grid::new("source_grid")
            .num_columns(2)
            .spacing([12.0, 4.0])
            .show(ui, |ui| {
                ui.label("Type:");
                ui.add_enabled_ui(editable, |ui| {
                    let source = controller.source_mut();
                    egui::ComboBox::from_id_salt("source_type")
                        .selected_text(source.source_type.as_str())
                        .show_ui(ui, |ui| {
                            for kind in SourceType::ALL {
                                ui.selectable_value(&mut source.source_type, kind, kind.as_str());
                            }
                        });
                });
                ui.end_row();

                ui.label("Location:");
                ui.horizontal(|ui| {
                    let source = controller.source_mut();
                    let takes_location = source.source_type.takes_location();
                    ui.add_enabled(
                        editable && takes_location,
                        egui::TextEdit::singleline(&mut source.location).desired_width(220.0),
                    );
                    let browse = ui.add_enabled(
                        editable && source.source_type == SourceType::File,
                        egui::Button::new("Browse..."),
                    );
                    if browse.clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Recordings", &["h5", "hdf5"])
                            .pick_file()
                        {
                            source.location = path.display().to_string();
                        }
                    }
                });
                ui.end_row();
            });

        ui.horizontal(|ui| {
            let action = if state == SessionState::SourceExists
                || state == SessionState::RecordingActive
            {
                Action::DeleteSource
            } else {
                Action::CreateSource
            };
            if ui
                .add_enabled(
                    allowed.allows(action),
                    egui::Button::new(state.source_button_label()),
                )
                .clicked()
            {
                if action == Action::DeleteSource {
                    controller.delete_source();
                } else {
                    controller.create_source();
                }
            }
            if ui
                .add_enabled(
                    allowed.allows(Action::OpenSettings),
                    egui::Button::new("Settings..."),
                )
                .clicked()
            {
                request = Some(PanelRequest::OpenSettings);
            }
        });
    });
    request
}

fn recording_group(
    ui: &mut egui::Ui,
    controller: &mut SessionController,
    allowed: Affordances,
    state: SessionState,
) {
    ui.group(|ui| {
        ui.label(egui::RichText::new("Recording").strong());

        egui::Grid::new("recording_grid")
            .num_columns(2)
            .spacing([12.0, 4.0])
            .show(ui, |ui| {
                ui.label("Length (s):");
                let length = ui.add_enabled(
                    allowed.allows(Action::EditLength),
                    egui::TextEdit::singleline(controller.length_input_mut()).desired_width(80.0),
                );
                if entered(ui, &length) {
                    controller.commit_length();
                }
                ui.end_row();

                ui.label("Filename:");
                let filename = ui.add_enabled(
                    allowed.allows(Action::EditFilename),
                    egui::TextEdit::singleline(controller.filename_input_mut())
                        .desired_width(220.0),
                );
                if entered(ui, &filename) {
                    controller.commit_filename();
                }
                ui.end_row();

                ui.label("Save directory:");
                ui.horizontal(|ui| {
                    ui.label(&controller.snapshot().recording.save_directory);
                    let choose = ui.add_enabled(
                        allowed.allows(Action::ChooseSaveDirectory),
                        egui::Button::new("Choose..."),
                    );
                    if choose.clicked() {
                        if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                            controller.set_save_directory(dir.display().to_string());
                        }
                    }
                });
                ui.end_row();

                ui.label("Position (s):");
                ui.monospace(controller.snapshot().recording.position_text());
                ui.end_row();
            });

        let action = if state == SessionState::RecordingActive {
            Action::StopRecording
        } else {
            Action::StartRecording
        };
        if ui
            .add_enabled(
                allowed.allows(action),
                egui::Button::new(state.recording_button_label()),
            )
            .clicked()
        {
            if action == Action::StopRecording {
                controller.stop_recording();
            } else {
                controller.start_recording();
            }
        }
    });
}
