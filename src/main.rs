mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use app::RustyXrfApp;
use config::AnalysisConfig;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = AnalysisConfig::from_env();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty XRF – Scan Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(RustyXrfApp::new(config)))),
    )
}
