use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

// ---------------------------------------------------------------------------
// Stage motion table
// ---------------------------------------------------------------------------

/// One row of `StageTable.csv`: a raster position and its motor pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageEntry {
    /// 1-based step number.
    pub step: u32,
    pub z_pulse: i64,
    pub x_pulse: i64,
}

/// Ordered stage motion table, one entry per raster position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTable {
    pub entries: Vec<StageEntry>,
}

impl StageTable {
    pub fn new(entries: Vec<StageEntry>) -> Self {
        Self { entries }
    }

    /// Highest step number, which is also the number of positions scanned.
    pub fn max_step(&self) -> u32 {
        self.entries.iter().map(|e| e.step).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RasterGrid
// ---------------------------------------------------------------------------

/// Spatial shape of a raster scan. Positions run X-major: `z_steps`
/// consecutive steps share one X pulse value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterGrid {
    pub x_steps: usize,
    pub z_steps: usize,
}

impl RasterGrid {
    pub fn positions(&self) -> usize {
        self.x_steps * self.z_steps
    }

    /// Matrix cell `(row, col)` holding flat position `k`.
    pub fn cell_of(&self, k: usize) -> (usize, usize) {
        (k / self.z_steps, k % self.z_steps)
    }
}

impl fmt::Display for RasterGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.x_steps, self.z_steps)
    }
}

// ---------------------------------------------------------------------------
// Spectra
// ---------------------------------------------------------------------------

/// Channel-aligned sum of the three detector traces recorded at one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummedSpectrum {
    pub counts: Vec<i64>,
}

impl SummedSpectrum {
    pub fn len(&self) -> usize {
        self.counts.len()
    }
}

/// Every position's summed spectrum, keyed by 1-based step.
///
/// The `BTreeMap` keeps iteration in step order, which is also the raster's
/// row-major order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpectrumCollection {
    pub spectra: BTreeMap<u32, SummedSpectrum>,
}

impl SpectrumCollection {
    pub fn insert(&mut self, step: u32, spectrum: SummedSpectrum) {
        self.spectra.insert(step, spectrum);
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    /// Common channel count (0 when empty).
    pub fn channels(&self) -> usize {
        self.spectra.values().next().map_or(0, SummedSpectrum::len)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &SummedSpectrum)> {
        self.spectra.iter().map(|(step, sp)| (*step, sp))
    }
}

/// Channel-wise mean over all positions, with sub-unity means floored to 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeanSpectrum {
    pub values: Vec<f64>,
}

/// A pre-summed spectrum from one file (one value per channel).
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSpectrum {
    /// File name, used as the legend label.
    pub name: String,
    pub counts: Vec<f64>,
}

impl NamedSpectrum {
    pub fn new(name: impl Into<String>, counts: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            counts,
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }
}

// ---------------------------------------------------------------------------
// EmissionWindow
// ---------------------------------------------------------------------------

/// An energy range around an emission line, in eV.
///
/// `below` and `above` are the distances from `center` to each edge; a
/// symmetric window has them equal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionWindow {
    pub center: f64,
    pub below: f64,
    pub above: f64,
}

impl EmissionWindow {
    #[cfg(test)]
    pub fn symmetric(center: f64, half_width: f64) -> Self {
        Self {
            center,
            below: half_width,
            above: half_width,
        }
    }

    pub fn low(&self) -> f64 {
        self.center - self.below
    }

    pub fn high(&self) -> f64 {
        self.center + self.above
    }

    /// Channel range for a detector axis of `scale` eV per channel.
    ///
    /// The center and both widths are truncated to whole channels before
    /// combining, and the right edge is exclusive.
    pub fn channel_range(&self, scale: f64) -> Range<usize> {
        let to_channels = |ev: f64| (ev / scale).max(0.0) as usize;
        let center = to_channels(self.center);
        let start = center.saturating_sub(to_channels(self.below));
        let end = center.saturating_add(to_channels(self.above));
        start..end
    }
}

impl fmt::Display for EmissionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.below == self.above {
            write!(f, "{} ± {} eV", self.center, self.below)
        } else {
            write!(f, "{} -{} / +{} eV", self.center, self.below, self.above)
        }
    }
}

/// A characteristic emission line offered as a preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionLine {
    pub element: &'static str,
    pub energy_ev: f64,
}

pub const EMISSION_LINES: &[EmissionLine] = &[
    EmissionLine {
        element: "Zinc",
        energy_ev: 8639.0,
    },
    EmissionLine {
        element: "Calcium",
        energy_ev: 3691.0,
    },
];

// ---------------------------------------------------------------------------
// Derived results
// ---------------------------------------------------------------------------

/// Maximum inside a window for one spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Index into the spectrum (not into the window).
    pub index: usize,
    pub x: f64,
    pub value: f64,
}

/// Scalar intensities against scan distance or file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progression {
    pub points: Vec<(f64, f64)>,
}

impl Progression {
    pub fn xs(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.0)
    }
}

/// Dense row-major 2-D matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[cfg(test)]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }
}
