use eframe::egui;

use crate::config::AnalysisConfig;
use crate::state::{AppState, ViewMode};
use crate::ui::panels;
use crate::ui::plot::{self, RasterTexture};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RustyXrfApp {
    pub state: AppState,
    raster_texture: Option<RasterTexture>,
}

impl RustyXrfApp {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            state: AppState::new(config),
            raster_texture: None,
        }
    }
}

impl eframe::App for RustyXrfApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: analysis settings ----
        egui::SidePanel::left("settings_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                let mut config = self.state.config.clone();
                panels::side_panel(ui, &mut self.state, &mut config);
                self.state.update_config(config);
            });

        // ---- Central panel: plots ----
        egui::CentralPanel::default().show(ctx, |ui| match self.state.mode {
            ViewMode::Raster => plot::raster_view(ui, &self.state, &mut self.raster_texture),
            ViewMode::Spectra => plot::session_view(ui, &self.state),
        });
    }
}
