mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use std::path::Path;

use app::ViewerApp;
use config::ConfigManager;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = ConfigManager::with_global_config(Path::new("."));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Datalogger CSV Viewer",
        options,
        Box::new(move |_cc| Ok(Box::new(ViewerApp::new(config)))),
    )
}
