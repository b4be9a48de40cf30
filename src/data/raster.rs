use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use super::error::{XrfError, XrfResult};
use super::loader::{parse_count, read_detector_records, read_stage_table};
use super::model::{
    EmissionWindow, Matrix, MeanSpectrum, RasterGrid, SpectrumCollection, StageTable,
    SummedSpectrum,
};

/// Stage table file name inside a scan directory.
pub const STAGE_TABLE_FILE: &str = "StageTable.csv";

/// Detector energy axis, eV per channel.
pub const CHANNEL_SCALE_EV: f64 = 10.0;

/// Silicon drift detectors recorded at every step.
pub const DETECTORS: [u8; 3] = [1, 2, 3];

/// Detector file for `step` and `detector`, e.g. `12-3.mca`.
pub fn detector_file(dir: &Path, step: u32, detector: u8) -> PathBuf {
    dir.join(format!("{step}-{detector}.mca"))
}

// ---------------------------------------------------------------------------
// Artifact trimming
// ---------------------------------------------------------------------------

/// Record bands written by the MCA software around the channel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimBands {
    pub header: RangeInclusive<usize>,
    pub footer: RangeInclusive<usize>,
}

impl Default for TrimBands {
    fn default() -> Self {
        Self {
            header: 0..=11,
            footer: 2060..=2128,
        }
    }
}

impl TrimBands {
    /// Drop both bands and reindex densely. Records past the footer band
    /// are kept.
    pub fn trim<'a, T>(&self, records: &'a [T]) -> Vec<&'a T> {
        records
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.header.contains(i) && !self.footer.contains(i))
            .map(|(_, r)| r)
            .collect()
    }

    /// Length after trimming a trace of `len` records.
    #[cfg(test)]
    pub fn trimmed_len(&self, len: usize) -> usize {
        let overlap = |band: &RangeInclusive<usize>| {
            if len == 0 || band.start() >= &len {
                0
            } else {
                (*band.end()).min(len - 1) - band.start() + 1
            }
        };
        len - overlap(&self.header) - overlap(&self.footer)
    }
}

// ---------------------------------------------------------------------------
// Loaded raster scan
// ---------------------------------------------------------------------------

/// A raster scan ingested from disk. Read-only after [`RasterScan::load`].
#[derive(Debug, Clone)]
pub struct RasterScan {
    pub dir: PathBuf,
    pub stage: StageTable,
    pub grid: RasterGrid,
    pub collection: SpectrumCollection,
    pub mean: MeanSpectrum,
}

impl RasterScan {
    /// Load `StageTable.csv` and every `{step}-{1|2|3}.mca` from `dir`.
    pub fn load(dir: &Path) -> XrfResult<Self> {
        Self::load_with(dir, &TrimBands::default())
    }

    pub fn load_with(dir: &Path, bands: &TrimBands) -> XrfResult<Self> {
        let (stage, collection) = load(dir, bands)?;
        let grid = derive_grid(&stage)?;
        let mean = mean_spectrum(&collection);
        log::info!(
            "Loaded raster scan {} ({} positions, grid {grid}, {} channels)",
            dir.display(),
            collection.len(),
            collection.channels()
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            stage,
            grid,
            collection,
            mean,
        })
    }

    /// Windowed sums reshaped onto the raster grid.
    pub fn raster(&self, window: &EmissionWindow, channel_scale: f64) -> XrfResult<Matrix> {
        let sums = windowed_sum(&self.collection, window, channel_scale)?;
        reshape(&sums, self.grid)
    }
}

// ---------------------------------------------------------------------------
// Engine operations
// ---------------------------------------------------------------------------

/// Parse the stage table and sum the three detector traces of every step.
pub fn load(dir: &Path, bands: &TrimBands) -> XrfResult<(StageTable, SpectrumCollection)> {
    let stage_path = dir.join(STAGE_TABLE_FILE);
    let stage = read_stage_table(&stage_path)
        .map_err(|e| XrfError::ingestion(&stage_path, format!("{e:#}")))?;
    if stage.is_empty() {
        return Err(XrfError::ingestion(&stage_path, "stage table has no rows"));
    }

    let mut collection = SpectrumCollection::default();
    let mut channels: Option<usize> = None;
    for step in 1..=stage.max_step() {
        let summed = sum_step(dir, step, bands)?;
        match channels {
            None => channels = Some(summed.len()),
            Some(expected) if expected != summed.len() => {
                return Err(XrfError::ingestion(
                    detector_file(dir, step, DETECTORS[0]),
                    format!(
                        "step {step} has {} channels after trimming, step 1 has {expected}",
                        summed.len()
                    ),
                ));
            }
            Some(_) => {}
        }
        collection.insert(step, summed);
    }
    Ok((stage, collection))
}

/// Read, trim and parse one detector file.
pub fn read_trace(path: &Path, bands: &TrimBands) -> XrfResult<Vec<i64>> {
    log::debug!("Reading detector trace {}", path.display());
    let records =
        read_detector_records(path).map_err(|e| XrfError::ingestion(path, format!("{e:#}")))?;
    bands
        .trim(&records)
        .into_iter()
        .enumerate()
        .map(|(channel, cell)| {
            parse_count(cell, channel).map_err(|e| XrfError::ingestion(path, format!("{e:#}")))
        })
        .collect()
}

fn sum_step(dir: &Path, step: u32, bands: &TrimBands) -> XrfResult<SummedSpectrum> {
    let mut counts: Vec<i64> = Vec::new();
    for (n, detector) in DETECTORS.iter().enumerate() {
        let path = detector_file(dir, step, *detector);
        let trace = read_trace(&path, bands)?;
        if n == 0 {
            counts = trace;
            continue;
        }
        if trace.len() != counts.len() {
            return Err(XrfError::ingestion(
                &path,
                format!(
                    "{} channels after trimming, detector {} has {}",
                    trace.len(),
                    DETECTORS[0],
                    counts.len()
                ),
            ));
        }
        for (acc, c) in counts.iter_mut().zip(trace) {
            *acc += c;
        }
    }
    Ok(SummedSpectrum { counts })
}

/// Derive the raster shape from the stage table.
///
/// The Z line length is the number of rows sharing the first row's X
/// pulse; the first stage run must therefore be a complete Z line.
pub fn derive_grid(stage: &StageTable) -> XrfResult<RasterGrid> {
    let first = stage
        .entries
        .first()
        .ok_or_else(|| XrfError::Shape("stage table is empty".into()))?;
    let z_steps = stage
        .entries
        .iter()
        .filter(|e| e.x_pulse == first.x_pulse)
        .count();
    let total = stage.max_step() as usize;
    let grid = RasterGrid {
        x_steps: total / z_steps,
        z_steps,
    };
    if grid.positions() != total {
        return Err(XrfError::Shape(format!(
            "{} steps do not fill a {grid} grid (Z line of {z_steps} at X pulse {})",
            total, first.x_pulse
        )));
    }
    Ok(grid)
}

/// Channel-wise mean over all positions. Means strictly between 0 and 1
/// are set to 0.
pub fn mean_spectrum(collection: &SpectrumCollection) -> MeanSpectrum {
    let n = collection.len();
    if n == 0 {
        return MeanSpectrum::default();
    }
    let mut totals = vec![0i64; collection.channels()];
    for (_, spectrum) in collection.iter() {
        for (t, c) in totals.iter_mut().zip(&spectrum.counts) {
            *t += c;
        }
    }
    let values = totals
        .into_iter()
        .map(|t| {
            let mean = t as f64 / n as f64;
            if mean > 0.0 && mean < 1.0 { 0.0 } else { mean }
        })
        .collect();
    MeanSpectrum { values }
}

/// Per-position sum over the window's channel range, in step order.
///
/// The range end is exclusive and clamped to the spectrum length.
pub fn windowed_sum(
    collection: &SpectrumCollection,
    window: &EmissionWindow,
    channel_scale: f64,
) -> XrfResult<Vec<f64>> {
    let range = window.channel_range(channel_scale);
    let channels = collection.channels();
    let start = range.start.min(channels);
    let end = range.end.min(channels);
    if start >= end {
        return Err(XrfError::DegenerateWindow {
            low: range.start,
            high: range.end,
        });
    }
    Ok(collection
        .iter()
        .map(|(_, sp)| sp.counts[start..end].iter().sum::<i64>() as f64)
        .collect())
}

/// Row-major reshape into `x_steps` rows of `z_steps`.
pub fn reshape(values: &[f64], grid: RasterGrid) -> XrfResult<Matrix> {
    if values.len() != grid.positions() {
        return Err(XrfError::Shape(format!(
            "{} values cannot fill a {grid} grid",
            values.len()
        )));
    }
    let mut data = vec![0.0; values.len()];
    for (k, &v) in values.iter().enumerate() {
        let (row, col) = grid.cell_of(k);
        data[row * grid.z_steps + col] = v;
    }
    Ok(Matrix {
        rows: grid.x_steps,
        cols: grid.z_steps,
        data,
    })
}

/// Physical axis coordinates: `0, pitch, 2*pitch, ...`.
pub fn axis_coordinates(steps: usize, pitch_um: f64) -> Vec<f64> {
    (0..steps).map(|i| i as f64 * pitch_um).collect()
}

/// Energy axis (eV) for a spectrum of `channels` channels.
pub fn energy_axis(channels: usize, channel_scale: f64) -> Vec<f64> {
    (0..channels).map(|i| i as f64 * channel_scale).collect()
}
