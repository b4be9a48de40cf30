use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::model::EmissionWindow;

/// Environment variable naming an optional JSON file with start-up settings.
pub const CONFIG_ENV: &str = "RUSTY_XRF_CONFIG";

/// Scalar plotted in the progression for each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionMetric {
    /// Maximum inside the window.
    #[default]
    Peak,
    /// Sum over the window.
    WindowSum,
}

impl ProgressionMetric {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressionMetric::Peak => "Peak counts",
            ProgressionMetric::WindowSum => "Window sum",
        }
    }
}

// ---------------------------------------------------------------------------
// AnalysisConfig – every user-adjustable input of the derived computations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Emission line center (eV).
    pub energy_ev: f64,
    /// Window extent below the center (eV).
    pub width_below_ev: f64,
    /// Window extent above the center (eV).
    pub width_above_ev: f64,
    pub log_display: bool,
    /// eV per channel of the spectrum x-axis.
    pub channel_scale_ev: f64,
    pub metric: ProgressionMetric,
    /// Distance between consecutive files; `None` or 0 plots by file order.
    pub step_size: Option<f64>,
    pub step_unit: String,
    /// Raster pixel pitch along X (µm).
    pub x_pixel_um: f64,
    /// Raster pixel pitch along Z (µm).
    pub z_pixel_um: f64,
    /// Counts at which the raster colour scale saturates.
    pub max_counts: Option<f64>,
    pub show_mean: bool,
    pub show_all_traces: bool,
    pub show_legend: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            energy_ev: 8700.0,
            width_below_ev: 150.0,
            width_above_ev: 150.0,
            log_display: false,
            channel_scale_ev: 10.0,
            metric: ProgressionMetric::Peak,
            step_size: None,
            step_unit: String::new(),
            x_pixel_um: 1000.0,
            z_pixel_um: 25.0,
            max_counts: None,
            show_mean: true,
            show_all_traces: false,
            show_legend: true,
        }
    }
}

impl AnalysisConfig {
    pub fn window(&self) -> EmissionWindow {
        EmissionWindow {
            center: self.energy_ev,
            below: self.width_below_ev,
            above: self.width_above_ev,
        }
    }

    /// Center the window on `energy_ev` with equal widths.
    pub fn set_symmetric(&mut self, energy_ev: f64, half_width_ev: f64) {
        self.energy_ev = energy_ev;
        self.width_below_ev = half_width_ev;
        self.width_above_ev = half_width_ev;
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Defaults, overridden by the file named in [`CONFIG_ENV`] if set.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            return Self::default();
        };
        match Self::from_json_file(Path::new(&path)) {
            Ok(config) => {
                log::info!("Loaded settings from {}", Path::new(&path).display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring {CONFIG_ENV}: {e:#}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_window_matches_zinc_scan_settings() {
        let config = AnalysisConfig::default();
        let window = config.window();
        assert_eq!(window.low(), 8550.0);
        assert_eq!(window.high(), 8850.0);
        assert_eq!(config.step_size, None);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("xrf.json");
        fs::write(
            &path,
            r#"{"energy_ev": 3691, "metric": "window_sum", "step_size": 0.5, "step_unit": "mm"}"#,
        )
        .unwrap();

        let config = AnalysisConfig::from_json_file(&path).unwrap();
        assert_eq!(config.energy_ev, 3691.0);
        assert_eq!(config.metric, ProgressionMetric::WindowSum);
        assert_eq!(config.step_size, Some(0.5));
        assert_eq!(config.width_below_ev, 150.0);
        assert_eq!(config.z_pixel_um, 25.0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("xrf.json");
        fs::write(&path, "{ energy").unwrap();
        assert!(AnalysisConfig::from_json_file(&path).is_err());
    }

    #[test]
    fn set_symmetric_updates_both_widths() {
        let mut config = AnalysisConfig::default();
        config.set_symmetric(3691.0, 40.0);
        assert_eq!(config.window(), EmissionWindow::symmetric(3691.0, 40.0));
    }
}
