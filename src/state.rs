use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::data::error::XrfError;
use crate::data::loader::load_spectrum_file;
use crate::data::model::{Matrix, EMISSION_LINES};
use crate::data::raster::{axis_coordinates, RasterScan, CHANNEL_SCALE_EV};
use crate::data::session::{SessionAnalysis, SpectrumSession};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Which dataset the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Raster,
    Spectra,
}

/// Raster matrix ready for heat-map rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterView {
    /// `x_steps` rows of `z_steps` windowed sums.
    pub matrix: Matrix,
    /// Physical X coordinate of each row (µm).
    pub x_axis: Vec<f64>,
    /// Physical Z coordinate of each column (µm).
    pub z_axis: Vec<f64>,
    pub title: String,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: AnalysisConfig,
    pub mode: ViewMode,

    /// Loaded raster scan (None until user opens a scan folder).
    pub raster: Option<RasterScan>,
    pub raster_view: Option<RasterView>,
    pub raster_error: Option<String>,

    /// Pre-summed spectra opened by the user.
    pub session: SpectrumSession,
    pub analysis: Option<SessionAnalysis>,
    pub session_error: Option<String>,

    /// Index into [`EMISSION_LINES`] of the chosen preset, if any.
    pub selected_line: Option<usize>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Whether a file loading operation is in progress.
    pub loading: bool,

    /// Bumped every time derived results are recomputed.
    pub revision: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl AppState {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            mode: ViewMode::Spectra,
            raster: None,
            raster_view: None,
            raster_error: None,
            session: SpectrumSession::default(),
            analysis: None,
            session_error: None,
            selected_line: None,
            status_message: None,
            loading: false,
            revision: 0,
        }
    }

    /// Ingest a raster scan folder. On failure no raster is kept.
    pub fn load_raster_dir(&mut self, dir: &Path) {
        self.loading = true;
        match RasterScan::load(dir) {
            Ok(scan) => {
                self.raster = Some(scan);
                self.mode = ViewMode::Raster;
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to load raster scan: {e}");
                self.raster = None;
                self.raster_view = None;
                self.status_message = Some(format!("Error: {e}"));
            }
        }
        self.loading = false;
        self.recompute();
    }

    /// Append pre-summed spectra. Files that fail to load are skipped and
    /// reported.
    pub fn add_spectra(&mut self, paths: &[PathBuf]) {
        self.loading = true;
        let mut failures = Vec::new();
        for path in paths {
            match load_spectrum_file(path) {
                Ok(spectrum) => {
                    log::info!("Loaded {} ({} channels)", spectrum.name, spectrum.len());
                    self.session.push(spectrum);
                }
                Err(e) => {
                    log::error!("Failed to load file: {e:#}");
                    failures.push(format!("{e:#}"));
                }
            }
        }
        self.status_message = if failures.is_empty() {
            None
        } else {
            Some(format!("Error: {}", failures.join("; ")))
        };
        if !self.session.is_empty() {
            self.mode = ViewMode::Spectra;
        }
        self.loading = false;
        self.recompute();
    }

    pub fn clear_spectra(&mut self) {
        self.session.clear();
        self.recompute();
    }

    /// Center the window on a preset emission line, keeping its widths.
    pub fn select_line(&mut self, index: usize) {
        if let Some(line) = EMISSION_LINES.get(index) {
            self.selected_line = Some(index);
            self.config.energy_ev = line.energy_ev;
            self.recompute();
        }
    }

    /// Replace the configuration, recomputing only if something changed.
    pub fn update_config(&mut self, config: AnalysisConfig) {
        if config != self.config {
            self.config = config;
            self.recompute();
        }
    }

    /// Recompute every derived quantity from the loaded data and config.
    ///
    /// A bad window or misaligned spectra clear only the derived view; the
    /// loaded spectra stay displayed.
    pub fn recompute(&mut self) {
        self.revision += 1;
        self.recompute_raster();
        self.recompute_session();
    }

    fn recompute_raster(&mut self) {
        self.raster_error = None;
        let Some(scan) = &self.raster else {
            self.raster_view = None;
            return;
        };
        let window = self.config.window();
        match scan.raster(&window, CHANNEL_SCALE_EV) {
            Ok(matrix) => {
                self.raster_view = Some(RasterView {
                    x_axis: axis_coordinates(matrix.rows, self.config.x_pixel_um),
                    z_axis: axis_coordinates(matrix.cols, self.config.z_pixel_um),
                    title: format!("{window} Emission Distribution"),
                    matrix,
                });
            }
            Err(e) if e.is_fatal() => {
                log::error!("Raster no longer matches its grid: {e}");
                self.raster = None;
                self.raster_view = None;
                self.status_message = Some(format!("Error: {e}"));
            }
            Err(e) => {
                log::warn!("Raster recompute failed: {e}");
                self.raster_view = None;
                self.raster_error = Some(e.to_string());
            }
        }
    }

    fn recompute_session(&mut self) {
        self.session_error = None;
        if self.session.is_empty() {
            self.analysis = None;
            return;
        }
        match self.session.analyze(&self.config) {
            Ok(analysis) => self.analysis = Some(analysis),
            Err(XrfError::EmptyInput) => self.analysis = None,
            Err(e) => {
                log::warn!("Spectrum analysis failed: {e}");
                self.analysis = None;
                self.session_error = Some(e.to_string());
            }
        }
    }
}
