//! Source settings window.

use eframe::egui;

use blds_client::{SourceParam, Trigger};

use crate::analog_output::{FILE_EXTENSIONS, HDF5_ENABLED};
use crate::source_settings::{
    PanelState, SourceSettingsPanel, CONFIGURATION_EXTENSIONS, MAX_ADC_RANGE, MAX_PLUG,
    MIN_ADC_RANGE,
};

/// Window wrapper around a [`SourceSettingsPanel`].
pub struct SettingsWindow {
    panel: SourceSettingsPanel,
    /// ADC range being dragged or typed, committed when the edit ends
    adc_range_edit: Option<f64>,
}

impl SettingsWindow {
    /// Wrap a freshly opened panel.
    #[must_use]
    pub fn new(panel: SourceSettingsPanel) -> Self {
        Self {
            panel,
            adc_range_edit: None,
        }
    }

    /// The panel model.
    pub fn panel_mut(&mut self) -> &mut SourceSettingsPanel {
        &mut self.panel
    }

    /// Whether the window should stay on screen.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.panel.is_open()
    }

    /// Render the window. Closing it closes the panel's session.
    pub fn show(&mut self, ctx: &egui::Context, enabled: bool) {
        let mut open = true;
        egui::Window::new("Source settings")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                ui.add_enabled_ui(enabled, |ui| match self.panel.state() {
                    PanelState::Connecting => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Connecting...");
                        });
                    }
                    PanelState::Loading => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Loading settings...");
                        });
                    }
                    PanelState::Ready => self.show_params(ui),
                    PanelState::Closed => {}
                });
            });
        if !open {
            self.panel.close();
        }
    }

    fn show_params(&mut self, ui: &mut egui::Ui) {
        let params = self.panel.params().clone();

        egui::Grid::new("source_settings_grid")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                ui.label("ADC range:");
                let mut range = self.adc_range_edit.unwrap_or(params.adc_range);
                let response = ui.add_enabled(
                    self.panel.can_edit(SourceParam::AdcRange),
                    egui::DragValue::new(&mut range)
                        .range(MIN_ADC_RANGE..=MAX_ADC_RANGE)
                        .speed(0.01)
                        .max_decimals(3)
                        .suffix(" V"),
                );
                if response.changed() {
                    self.adc_range_edit = Some(range);
                }
                if response.drag_stopped() || response.lost_focus() {
                    if let Some(range) = self.adc_range_edit.take() {
                        self.panel.set_adc_range(range);
                    }
                }
                ui.end_row();

                ui.label("Trigger:");
                ui.add_enabled_ui(self.panel.can_edit(SourceParam::Trigger), |ui| {
                    let mut trigger = params.trigger;
                    egui::ComboBox::from_id_salt("trigger")
                        .selected_text(trigger.as_str())
                        .show_ui(ui, |ui| {
                            for option in Trigger::ALL {
                                ui.selectable_value(&mut trigger, option, option.as_str());
                            }
                        });
                    if trigger != params.trigger {
                        self.panel.set_trigger(trigger);
                    }
                });
                ui.end_row();

                ui.label("Plug:");
                ui.add_enabled_ui(self.panel.can_edit(SourceParam::Plug), |ui| {
                    let selected = params.plug;
                    let mut plug = selected.unwrap_or(0);
                    egui::ComboBox::from_id_salt("plug")
                        .selected_text(selected.map_or_else(|| "n/a".to_string(), |p| p.to_string()))
                        .show_ui(ui, |ui| {
                            for option in 0..=MAX_PLUG {
                                ui.selectable_value(&mut plug, option, option.to_string());
                            }
                        });
                    if selected.is_some() && Some(plug) != selected {
                        self.panel.set_plug(plug);
                    }
                });
                ui.end_row();

                ui.label("Configuration:");
                ui.horizontal(|ui| {
                    ui.label(params.configuration_file.as_deref().unwrap_or(""));
                    let load = ui.add_enabled(
                        self.panel.can_edit(SourceParam::ConfigurationFile),
                        egui::Button::new("Load..."),
                    );
                    if load.clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Configuration", &CONFIGURATION_EXTENSIONS)
                            .pick_file()
                        {
                            self.panel.set_configuration_file(path.display().to_string());
                        }
                    }
                });
                ui.end_row();

                ui.label("Analog output:");
                ui.horizontal(|ui| {
                    ui.label(params.analog_output.label());
                    let can_edit = self.panel.can_edit(SourceParam::AnalogOutput);
                    let load = ui.add_enabled(
                        self.panel.can_load_analog_output(),
                        egui::Button::new("Load..."),
                    );
                    let load = if HDF5_ENABLED {
                        load
                    } else {
                        load.on_disabled_hover_text(
                            "Loading waveforms needs HDF5 support (build with --features hdf5)",
                        )
                    };
                    if load.clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("HDF5", &FILE_EXTENSIONS)
                            .pick_file()
                        {
                            self.panel.load_analog_output(path);
                        }
                    }
                    if ui.add_enabled(can_edit, egui::Button::new("Clear")).clicked() {
                        self.panel.clear_analog_output();
                    }
                });
                ui.end_row();
            });
    }
}
