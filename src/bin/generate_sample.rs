use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::Int64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Channels of channel data per detector file.
const CHANNELS: usize = 2048;
/// eV per channel.
const CHANNEL_EV: f64 = 10.0;
/// Zinc Kα and Calcium Kα.
const ZN_KA: f64 = 8639.0;
const CA_KA: f64 = 3691.0;

const X_STEPS: usize = 12;
const Z_STEPS: usize = 6;
const SPECTRA_FILES: usize = 8;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Expected counts per channel for the given line amplitudes.
fn model_spectrum(zn: f64, ca: f64) -> Vec<f64> {
    (0..CHANNELS)
        .map(|ch| {
            let e = ch as f64 * CHANNEL_EV;
            gaussian(e, ZN_KA, 70.0, zn) + gaussian(e, CA_KA, 55.0, ca) + 0.3
        })
        .collect()
}

fn draw_counts(expected: &[f64], rng: &mut SimpleRng) -> Vec<i64> {
    expected
        .iter()
        .map(|&lambda| {
            let noisy = rng.gauss(lambda, lambda.sqrt());
            noisy.round().max(0.0) as i64
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// ---------------------------------------------------------------------------
// Raster scan folder
// ---------------------------------------------------------------------------

/// Amptek-style MCA file: 12 header lines, channel data, footer.
fn write_mca(path: &Path, counts: &[i64], step: usize, detector: u8) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "<<PMCA SPECTRUM>>")?;
    writeln!(w, "TAG - step {step}")?;
    writeln!(w, "DESCRIPTION - SDD {detector}")?;
    for line in [
        "GAIN - 2.000",
        "THRESHOLD - 0",
        "LIVE_MODE - 0",
        "PRESET_TIME - 1",
        "LIVE_TIME - 0.98",
        "REAL_TIME - 1.00",
        "START_TIME - 01/01/2024 00:00:00",
        "SERIAL_NUMBER - 0",
        "<<DATA>>",
    ] {
        writeln!(w, "{line}")?;
    }
    for c in counts {
        writeln!(w, "{c}")?;
    }
    writeln!(w, "<<END>>")?;
    writeln!(w, "<<DP5 CONFIGURATION>>")?;
    for i in 0..66 {
        writeln!(w, "CFG{i:02}=0;")?;
    }
    writeln!(w, "<<DP5 CONFIGURATION END>>")?;
    w.flush()?;
    Ok(())
}

fn write_raster_scan(dir: &Path, rng: &mut SimpleRng) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut stage = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(dir.join("StageTable.csv"))?;

    let mut step = 0usize;
    for xi in 0..X_STEPS {
        for zi in 0..Z_STEPS {
            step += 1;
            stage.write_record(&[
                step.to_string(),
                (zi * 250).to_string(),
                (xi * 10_000).to_string(),
            ])?;

            // A zinc-rich band along Z crossing the scan diagonally.
            let d = xi as f64 - 2.0 * zi as f64;
            let zn = 40.0 * (-d * d / 6.0).exp() + 0.5;
            let ca = 6.0 + zi as f64;
            let expected = model_spectrum(zn / 3.0, ca / 3.0);
            for detector in 1..=3u8 {
                let counts = draw_counts(&expected, rng);
                let path = dir.join(format!("{step}-{detector}.mca"));
                write_mca(&path, &counts, step, detector)?;
            }
        }
    }
    stage.flush()?;
    println!(
        "Wrote a {X_STEPS} x {Z_STEPS} raster scan ({} positions) to {}",
        step,
        dir.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Pre-summed spectra
// ---------------------------------------------------------------------------

fn write_counts_csv(path: &Path, counts: &[i64]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Counts"])?;
    for c in counts {
        writer.write_record([c.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_counts_parquet(path: &Path, counts: &[i64]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![Field::new("Counts", DataType::Int64, false)]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Int64Array::from(counts.to_vec()))],
    )
    .context("building record batch")?;
    let file = fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_spectra(dir: &Path, rng: &mut SimpleRng) -> Result<()> {
    fs::create_dir_all(dir)?;
    for k in 0..SPECTRA_FILES {
        // Zinc signal fading along the line scan.
        let zn = 120.0 * (-(k as f64) / 3.0).exp() + 2.0;
        let counts = draw_counts(&model_spectrum(zn, 15.0), rng);
        write_counts_csv(&dir.join(format!("line_{k:02}.csv")), &counts)?;
        if k == 0 {
            write_counts_parquet(&dir.join("line_00.parquet"), &counts)?;
        }
    }
    println!("Wrote {SPECTRA_FILES} summed spectra to {}", dir.display());
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    write_raster_scan(Path::new("sample_scan"), &mut rng)?;
    write_spectra(Path::new("sample_spectra"), &mut rng)?;
    Ok(())
}
