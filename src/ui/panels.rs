use eframe::egui::{self, Color32, ComboBox, ProgressBar, RichText, Ui};

use crate::data::special::Capability;
use crate::state::{AppState, TimeUnit, SUBPLOT_COUNT};

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu bar and, during a load, the progress bar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            // One load at a time; the trigger is disabled while in flight.
            let open = egui::Button::new("Open directory…");
            if ui.add_enabled(!state.is_loading(), open).clicked() {
                open_directory_dialog(state);
                ui.close_menu();
            }
        });
        ui.menu_button("Help", |ui: &mut Ui| {
            if ui.button("About").clicked() {
                state.show_about = true;
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!("{} series loaded", ds.display_names().len()));
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });

    if let Some(load) = &state.load {
        ui.add(
            ProgressBar::new(load.percent as f32 / 100.0)
                .text(format!("{} {}%", load.phase, load.percent)),
        );
    }
}

fn open_directory_dialog(state: &mut AppState) {
    let directory = rfd::FileDialog::new()
        .set_title("Choose directory to process")
        .pick_folder();
    if let Some(directory) = directory {
        state.start_load(directory);
    }
}

// ---------------------------------------------------------------------------
// Side panel – subplot selection, averaging, special actions
// ---------------------------------------------------------------------------

/// Render the control panel on the left.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Subplots");
    ui.separator();

    let Some(choices) = state.dataset.as_ref().map(|ds| ds.numeric_display_names()) else {
        ui.label("No data loaded.");
        return;
    };

    for slot in 0..SUBPLOT_COUNT {
        let current = state.subplots[slot].clone();
        let current_label = current.as_deref().unwrap_or("None").to_string();
        ComboBox::from_label(format!("Subplot {}", slot + 1))
            .selected_text(current_label)
            .show_ui(ui, |ui: &mut Ui| {
                if ui
                    .selectable_label(current.is_none(), "None")
                    .clicked()
                {
                    state.set_subplot(slot, None);
                }
                for name in &choices {
                    let selected = current.as_deref() == Some(name);
                    if ui.selectable_label(selected, name).clicked() {
                        state.set_subplot(slot, Some(name.clone()));
                    }
                }
            });
    }

    ui.add_space(8.0);
    ui.heading("Averaging");
    ui.separator();

    let active = state.active_display_names();
    let selected_label = state
        .selected_series
        .clone()
        .unwrap_or_else(|| "None".to_string());
    ComboBox::from_label("Series")
        .selected_text(selected_label)
        .show_ui(ui, |ui: &mut Ui| {
            for name in &active {
                let selected = state.selected_series.as_deref() == Some(name);
                if ui.selectable_label(selected, name).clicked() {
                    state.selected_series = Some(name.clone());
                }
            }
        });

    ui.horizontal(|ui: &mut Ui| {
        ui.add(
            egui::TextEdit::singleline(&mut state.average_value).desired_width(60.0),
        );
        ComboBox::from_id_salt("average_unit")
            .selected_text(state.average_unit.label())
            .show_ui(ui, |ui: &mut Ui| {
                for unit in TimeUnit::ALL {
                    if ui
                        .selectable_label(state.average_unit == unit, unit.label())
                        .clicked()
                    {
                        state.average_unit = unit;
                    }
                }
            });
    });
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Average").clicked() {
            state.apply_average();
        }
        if ui.button("Reset").clicked() {
            state.reset_average();
        }
    });

    special_actions(ui, state);
}

/// Buttons for the extra display modes the selected series offers.
fn special_actions(ui: &mut Ui, state: &mut AppState) {
    let capabilities = state
        .selected_series
        .as_ref()
        .zip(state.dataset.as_ref())
        .and_then(|(name, ds)| ds.special_capabilities(name).ok())
        .unwrap_or_default();
    if capabilities.is_empty() {
        return;
    }

    ui.add_space(8.0);
    ui.heading("Special");
    ui.separator();
    for capability in capabilities {
        if ui.button(capability.label()).clicked() {
            match capability {
                Capability::Windrose { speed, direction } => {
                    state.windrose = Some((speed, direction));
                }
                Capability::Histogram => {
                    state.histogram = state.selected_series.clone();
                }
            }
        }
    }
}
