use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Slider, Ui};

use crate::config::{AnalysisConfig, ProgressionMetric};
use crate::data::model::EMISSION_LINES;
use crate::state::{AppState, ViewMode};
use crate::ui::export;

/// Window widths offered by the sliders (eV either side of the center).
const MAX_WIDTH_EV: f64 = 1000.0;

// ---------------------------------------------------------------------------
// Left side panel – analysis settings
// ---------------------------------------------------------------------------

/// Render the settings panel. Edits go into `config`; the caller applies
/// them after the frame.
pub fn side_panel(ui: &mut Ui, state: &mut AppState, config: &mut AnalysisConfig) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.heading("Emission window");
            ui.separator();
            emission_controls(ui, state, config);

            ui.add_space(8.0);
            ui.heading("Display");
            ui.separator();
            ui.checkbox(&mut config.log_display, "Log counts");
            ui.checkbox(&mut config.show_legend, "Show legend");
            if state.raster.is_some() {
                ui.checkbox(&mut config.show_mean, "Show average spectrum");
                ui.checkbox(&mut config.show_all_traces, "Show every step")
                    .on_hover_text("Slow for large scans");
            }

            ui.add_space(8.0);
            egui::CollapsingHeader::new(RichText::new("Spectra analysis").strong())
                .default_open(true)
                .show(ui, |ui: &mut Ui| session_controls(ui, config));

            egui::CollapsingHeader::new(RichText::new("Raster image").strong())
                .default_open(true)
                .show(ui, |ui: &mut Ui| raster_controls(ui, config));
        });
}

fn emission_controls(ui: &mut Ui, state: &mut AppState, config: &mut AnalysisConfig) {
    let selected = state
        .selected_line
        .and_then(|i| EMISSION_LINES.get(i))
        .map(|line| line.element)
        .unwrap_or("Custom");
    egui::ComboBox::from_id_salt("emission_line")
        .selected_text(selected)
        .show_ui(ui, |ui: &mut Ui| {
            for (i, line) in EMISSION_LINES.iter().enumerate() {
                let label = format!("{} ({} eV)", line.element, line.energy_ev);
                if ui
                    .selectable_label(state.selected_line == Some(i), label)
                    .clicked()
                {
                    state.select_line(i);
                    config.energy_ev = state.config.energy_ev;
                }
            }
        });

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Energy");
        let response = ui.add(
            DragValue::new(&mut config.energy_ev)
                .speed(5.0)
                .range(0.0..=f64::MAX)
                .suffix(" eV"),
        );
        if response.changed() {
            state.selected_line = None;
        }
    });

    ui.add(
        Slider::new(&mut config.width_below_ev, 0.0..=MAX_WIDTH_EV)
            .text("below (eV)")
            .step_by(config.channel_scale_ev.max(1.0)),
    );
    ui.add(
        Slider::new(&mut config.width_above_ev, 0.0..=MAX_WIDTH_EV)
            .text("above (eV)")
            .step_by(config.channel_scale_ev.max(1.0)),
    );
    if ui.small_button("Symmetric").clicked() {
        let half = (config.width_below_ev + config.width_above_ev) / 2.0;
        config.set_symmetric(config.energy_ev, half);
    }
}

fn session_controls(ui: &mut Ui, config: &mut AnalysisConfig) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Channel width");
        ui.add(
            DragValue::new(&mut config.channel_scale_ev)
                .speed(0.1)
                .range(0.01..=1000.0)
                .suffix(" eV"),
        );
    });

    ui.label("Progression");
    ui.horizontal(|ui: &mut Ui| {
        for metric in [ProgressionMetric::Peak, ProgressionMetric::WindowSum] {
            ui.radio_value(&mut config.metric, metric, metric.label());
        }
    });

    let mut use_step = config.step_size.is_some();
    ui.checkbox(&mut use_step, "Scan step size");
    if use_step {
        let mut step = config.step_size.unwrap_or(1.0);
        ui.horizontal(|ui: &mut Ui| {
            ui.add(DragValue::new(&mut step).speed(0.1));
            ui.label("Unit");
            ui.text_edit_singleline(&mut config.step_unit);
        });
        config.step_size = Some(step);
    } else {
        config.step_size = None;
    }
}

fn raster_controls(ui: &mut Ui, config: &mut AnalysisConfig) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label("X pixel");
        ui.add(
            DragValue::new(&mut config.x_pixel_um)
                .speed(1.0)
                .range(1.0..=1.0e6)
                .suffix(" µm"),
        );
    });
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Z pixel");
        ui.add(
            DragValue::new(&mut config.z_pixel_um)
                .speed(1.0)
                .range(1.0..=1.0e6)
                .suffix(" µm"),
        );
    });

    let mut clip = config.max_counts.is_some();
    ui.checkbox(&mut clip, "Limit colour scale");
    if clip {
        let mut ceiling = config.max_counts.unwrap_or(1000.0);
        ui.add(
            DragValue::new(&mut ceiling)
                .speed(10.0)
                .range(1.0..=f64::MAX)
                .suffix(" counts"),
        );
        config.max_counts = Some(ceiling);
    } else {
        config.max_counts = None;
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open scan folder…").clicked() {
                open_scan_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open spectra…").clicked() {
                open_spectra_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(!state.session.is_empty(), egui::Button::new("Clear spectra"))
                .clicked()
            {
                state.clear_spectra();
                ui.close_menu();
            }
            ui.separator();
            if ui
                .add_enabled(
                    state.raster_view.is_some(),
                    egui::Button::new("Export raster PNG…"),
                )
                .clicked()
            {
                export_raster_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        ui.selectable_value(&mut state.mode, ViewMode::Spectra, "Spectra");
        ui.selectable_value(&mut state.mode, ViewMode::Raster, "Raster");

        ui.separator();

        match state.mode {
            ViewMode::Raster => {
                if let Some(scan) = &state.raster {
                    let folder = scan
                        .dir
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    ui.label(format!(
                        "{folder}: {} positions ({} stage rows), grid {}, {} channels",
                        scan.collection.len(),
                        scan.stage.len(),
                        scan.grid,
                        scan.collection.channels()
                    ));
                }
            }
            ViewMode::Spectra => {
                if !state.session.is_empty() {
                    ui.label(format!("{} spectra loaded", state.session.len()));
                }
            }
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_scan_dialog(state: &mut AppState) {
    let folder = rfd::FileDialog::new()
        .set_title("Open raster scan folder (StageTable.csv + .mca files)")
        .pick_folder();

    if let Some(dir) = folder {
        state.load_raster_dir(&dir);
    }
}

pub fn open_spectra_dialog(state: &mut AppState) {
    let files = rfd::FileDialog::new()
        .set_title("Open summed spectra")
        .add_filter("Supported files", &["csv", "txt", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv", "txt"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_files();

    if let Some(paths) = files {
        state.add_spectra(&paths);
    }
}

pub fn export_raster_dialog(state: &mut AppState) {
    let Some(view) = &state.raster_view else {
        return;
    };
    let file = rfd::FileDialog::new()
        .set_title("Export raster image")
        .add_filter("PNG", &["png"])
        .set_file_name("raster.png")
        .save_file();

    if let Some(path) = file {
        match export::write_raster_png(&path, view, state.config.max_counts) {
            Ok(()) => {
                log::info!("Exported raster image to {}", path.display());
                state.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to export raster: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
