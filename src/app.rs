use std::time::Duration;

use eframe::egui;

use crate::config::ConfigManager;
use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct ViewerApp {
    pub state: AppState,
}

impl ViewerApp {
    pub fn new(config: ConfigManager) -> Self {
        Self {
            state: AppState::new(config),
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // While a load is in flight, poll the progress channel without
        // blocking and keep repainting so the bar stays live.
        if self.state.is_loading() {
            self.state.poll_load();
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        // ---- Top panel: menu bar and progress ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: subplot and averaging controls ----
        egui::SidePanel::left("controls")
            .default_width(220.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: time-series subplots ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::time_series(ui, &self.state);
        });

        self.show_windows(ctx);
    }
}

impl ViewerApp {
    /// Windrose, histogram, and about pop-up windows.
    fn show_windows(&mut self, ctx: &egui::Context) {
        if let Some((speed, direction)) = self.state.windrose.clone() {
            let mut open = true;
            egui::Window::new("Windrose")
                .open(&mut open)
                .default_size([420.0, 420.0])
                .show(ctx, |ui| {
                    if let Some(dataset) = &self.state.dataset {
                        plot::windrose(ui, dataset, &self.state.config, &speed, &direction);
                    }
                });
            if !open {
                self.state.windrose = None;
            }
        }

        if let Some(display) = self.state.histogram.clone() {
            let mut open = true;
            egui::Window::new("Histogram")
                .open(&mut open)
                .default_size([420.0, 320.0])
                .show(ctx, |ui| {
                    if let Some(dataset) = &self.state.dataset {
                        plot::histogram(ui, dataset, &display);
                    }
                });
            if !open {
                self.state.histogram = None;
            }
        }

        if self.state.show_about {
            let mut open = true;
            egui::Window::new("About")
                .open(&mut open)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.heading(env!("CARGO_PKG_NAME"));
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.label(env!("CARGO_PKG_DESCRIPTION"));
                });
            if !open {
                self.state.show_about = false;
            }
        }
    }
}
