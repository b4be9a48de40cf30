use crate::config::{AnalysisConfig, ProgressionMetric};

use super::error::{XrfError, XrfResult};
use super::model::{NamedSpectrum, Peak, Progression};
use super::search::{first_argmax, log_clamped, nearest_index, scaled_ordinals};

// ---------------------------------------------------------------------------
// SpectrumSession – pre-summed spectra loaded by the user
// ---------------------------------------------------------------------------

/// Pre-summed spectra in upload order. Index `i` is the file's ordinal in
/// the progression.
#[derive(Debug, Clone, Default)]
pub struct SpectrumSession {
    spectra: Vec<NamedSpectrum>,
}

/// Everything derived from one window selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAnalysis {
    pub low_index: usize,
    pub high_index: usize,
    /// X-axis samples inside the window.
    pub window_x: Vec<f64>,
    /// Display values inside the window, one section per file.
    pub sections: Vec<Vec<f64>>,
    pub peaks: Vec<Peak>,
    pub sums: Vec<f64>,
    pub average: Vec<f64>,
    pub progression: Progression,
}

impl SpectrumSession {
    #[cfg(test)]
    pub fn new(spectra: Vec<NamedSpectrum>) -> Self {
        Self { spectra }
    }

    pub fn push(&mut self, spectrum: NamedSpectrum) {
        self.spectra.push(spectrum);
    }

    pub fn clear(&mut self) {
        self.spectra.clear();
    }

    pub fn spectra(&self) -> &[NamedSpectrum] {
        &self.spectra
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Common channel count shared by every spectrum.
    pub fn check_alignment(&self) -> XrfResult<usize> {
        let first = self.spectra.first().ok_or(XrfError::EmptyInput)?;
        let expected = first.len();
        for sp in &self.spectra[1..] {
            if sp.len() != expected {
                return Err(XrfError::Alignment {
                    name: sp.name.clone(),
                    expected,
                    found: sp.len(),
                });
            }
        }
        Ok(expected)
    }

    /// Energy axis of the first spectrum.
    pub fn x_axis(&self, channel_scale: f64) -> Vec<f64> {
        let channels = self.spectra.first().map_or(0, NamedSpectrum::len);
        (0..channels).map(|i| i as f64 * channel_scale).collect()
    }

    /// Locate the window, then take the peak, windowed sum and section of
    /// every file.
    pub fn analyze(&self, config: &AnalysisConfig) -> XrfResult<SessionAnalysis> {
        self.check_alignment()?;
        let x_axis = self.x_axis(config.channel_scale_ev);
        let window = config.window();
        let (low_index, high_index) = window_to_indices(&x_axis, window.low(), window.high())?;

        let mut sections = Vec::with_capacity(self.len());
        let mut peaks = Vec::with_capacity(self.len());
        let mut sums = Vec::with_capacity(self.len());
        for sp in &self.spectra {
            let values = apply_scale(&sp.counts, config.log_display);
            peaks.push(extract_peak(&x_axis, &values, low_index, high_index)?);
            sums.push(extract_windowed_sum(&values, low_index, high_index)?);
            sections.push(values[low_index..=high_index].to_vec());
        }
        let average = average_spectrum(&sections)?;

        let metric: Vec<f64> = match config.metric {
            ProgressionMetric::Peak => peaks.iter().map(|p| p.value).collect(),
            ProgressionMetric::WindowSum => sums.clone(),
        };
        let progression = build_progression(&metric, config.step_size);

        log::debug!(
            "Window {window} -> indices [{low_index}, {high_index}] over {} files",
            self.len()
        );
        Ok(SessionAnalysis {
            low_index,
            high_index,
            window_x: x_axis[low_index..=high_index].to_vec(),
            sections,
            peaks,
            sums,
            average,
            progression,
        })
    }
}

// ---------------------------------------------------------------------------
// Windowing and peak operations
// ---------------------------------------------------------------------------

/// Display transform. With `log` every value becomes `ln(y)`, and
/// non-positive values become 0 rather than -inf/NaN.
pub fn apply_scale(values: &[f64], log: bool) -> Vec<f64> {
    if log {
        values.iter().map(|&y| log_clamped(y)).collect()
    } else {
        values.to_vec()
    }
}

/// Map energy bounds onto the nearest x-axis samples (ties to the lower
/// index). An empty axis or a NaN bound selects nothing.
pub fn window_to_indices(x_axis: &[f64], low: f64, high: f64) -> XrfResult<(usize, usize)> {
    let (Some(low_index), Some(high_index)) =
        (nearest_index(x_axis, low), nearest_index(x_axis, high))
    else {
        return Err(XrfError::DegenerateWindow { low: 0, high: 0 });
    };
    if low_index > high_index {
        return Err(XrfError::DegenerateWindow {
            low: low_index,
            high: high_index,
        });
    }
    Ok((low_index, high_index))
}

fn check_range(len: usize, low: usize, high: usize) -> XrfResult<()> {
    if low > high || high >= len {
        return Err(XrfError::DegenerateWindow { low, high });
    }
    Ok(())
}

/// Maximum within `[low, high]`. Repeated maxima resolve to the first
/// index.
pub fn extract_peak(x_axis: &[f64], values: &[f64], low: usize, high: usize) -> XrfResult<Peak> {
    check_range(values.len().min(x_axis.len()), low, high)?;
    let offset =
        first_argmax(&values[low..=high]).ok_or(XrfError::DegenerateWindow { low, high })?;
    let index = low + offset;
    Ok(Peak {
        index,
        x: x_axis[index],
        value: values[index],
    })
}

/// Sum of `values` over `[low, high]`.
pub fn extract_windowed_sum(values: &[f64], low: usize, high: usize) -> XrfResult<f64> {
    check_range(values.len(), low, high)?;
    Ok(values[low..=high].iter().sum())
}

/// Pair each value with `i * step_size`, or with the file ordinal `i`
/// when no non-zero step size is given.
pub fn build_progression(values: &[f64], step_size: Option<f64>) -> Progression {
    let xs = scaled_ordinals(values.len(), step_size);
    Progression {
        points: xs.into_iter().zip(values.iter().copied()).collect(),
    }
}

/// Element-wise mean of equal-length sections.
pub fn average_spectrum(sections: &[Vec<f64>]) -> XrfResult<Vec<f64>> {
    let first = sections.first().ok_or(XrfError::EmptyInput)?;
    let mut totals = vec![0.0; first.len()];
    for (n, section) in sections.iter().enumerate() {
        if section.len() != totals.len() {
            return Err(XrfError::Alignment {
                name: format!("section {n}"),
                expected: totals.len(),
                found: section.len(),
            });
        }
        for (t, v) in totals.iter_mut().zip(section) {
            *t += v;
        }
    }
    let n = sections.len() as f64;
    Ok(totals.into_iter().map(|t| t / n).collect())
}

/// X-axis label for the progression plot.
pub fn progression_axis_label(step_size: Option<f64>, unit: &str) -> String {
    match step_size {
        Some(s) if s != 0.0 => {
            if unit.trim().is_empty() {
                "Distance [Scan Step Size]".to_string()
            } else {
                format!("Distance [{}]", unit.trim())
            }
        }
        _ => "Scan Number".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Triangle peaking at `peak` on a flat background of 1.
    fn triangle(len: usize, peak: usize, height: f64) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let d = (i as f64 - peak as f64).abs();
                (height - d).max(1.0)
            })
            .collect()
    }

    fn unit_config(low: f64, high: f64) -> AnalysisConfig {
        let center = (low + high) / 2.0;
        AnalysisConfig {
            energy_ev: center,
            width_below_ev: center - low,
            width_above_ev: high - center,
            channel_scale_ev: 1.0,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn log_scale_clamps_non_positive() {
        let out = apply_scale(&[0.0, -2.0, 1.0, 100.0], true);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 0.0);
        assert_eq!(out[3], 100f64.ln());
        assert!(out.iter().all(|v| v.is_finite()));
        assert_eq!(apply_scale(&[0.0, 3.0], false), vec![0.0, 3.0]);
    }

    #[test]
    fn window_snaps_to_nearest_samples() {
        let axis: Vec<f64> = (0..10).map(|i| i as f64 * 10.0).collect();
        assert_eq!(window_to_indices(&axis, 21.0, 58.0).unwrap(), (2, 6));
        // 25 is equidistant from 20 and 30: lower index wins.
        assert_eq!(window_to_indices(&axis, 25.0, 25.0).unwrap(), (2, 2));
    }

    #[test]
    fn inverted_window_is_degenerate() {
        let axis: Vec<f64> = (0..10).map(f64::from).collect();
        assert!(matches!(
            window_to_indices(&axis, 7.0, 3.0),
            Err(XrfError::DegenerateWindow { low: 7, high: 3 })
        ));
    }

    #[test]
    fn peak_tie_resolves_to_first_index() {
        let axis: Vec<f64> = (0..8).map(|i| i as f64 * 10.0).collect();
        let values = [0.0, 9.0, 2.0, 9.0, 9.0, 1.0, 9.0, 0.0];
        let peak = extract_peak(&axis, &values, 2, 6).unwrap();
        assert_eq!(peak.index, 3);
        assert_eq!(peak.x, 30.0);
        assert_eq!(peak.value, 9.0);
    }

    #[test]
    fn peak_out_of_range_is_degenerate() {
        let axis = [0.0, 1.0, 2.0];
        let values = [1.0, 2.0, 3.0];
        assert!(extract_peak(&axis, &values, 1, 3).is_err());
        assert!(extract_peak(&axis, &values, 2, 1).is_err());
    }

    #[test]
    fn windowed_sum_is_inclusive() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(extract_windowed_sum(&values, 1, 3).unwrap(), 9.0);
        assert_eq!(extract_windowed_sum(&values, 4, 4).unwrap(), 5.0);
    }

    #[test]
    fn progression_falls_back_to_ordinals() {
        let values = [5.0, 6.0, 7.0];
        let ordinal = build_progression(&values, None);
        assert_eq!(ordinal.xs().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);
        let zero = build_progression(&values, Some(0.0));
        assert_eq!(zero.xs().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);
        let scaled = build_progression(&values, Some(0.5));
        assert_eq!(scaled.points, vec![(0.0, 5.0), (0.5, 6.0), (1.0, 7.0)]);
    }

    #[test]
    fn progression_axis_labels() {
        assert_eq!(progression_axis_label(None, "mm"), "Scan Number");
        assert_eq!(progression_axis_label(Some(0.0), "mm"), "Scan Number");
        assert_eq!(progression_axis_label(Some(2.0), ""), "Distance [Scan Step Size]");
        assert_eq!(progression_axis_label(Some(2.0), "um"), "Distance [um]");
    }

    #[test]
    fn average_rejects_empty_and_ragged_sections() {
        assert!(matches!(average_spectrum(&[]), Err(XrfError::EmptyInput)));
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            average_spectrum(&ragged),
            Err(XrfError::Alignment { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn two_files_share_peak_and_average() {
        let a = triangle(100, 50, 40.0);
        let b = triangle(100, 50, 20.0);
        let session = SpectrumSession::new(vec![
            NamedSpectrum::new("a.csv", a.clone()),
            NamedSpectrum::new("b.csv", b.clone()),
        ]);

        let analysis = session.analyze(&unit_config(40.0, 60.0)).unwrap();
        assert_eq!((analysis.low_index, analysis.high_index), (40, 60));
        assert_eq!(analysis.peaks[0].x, 50.0);
        assert_eq!(analysis.peaks[1].x, 50.0);
        assert_eq!(analysis.peaks[0].value, 40.0);

        let expected: Vec<f64> = (40..=60).map(|i| (a[i] + b[i]) / 2.0).collect();
        assert_eq!(analysis.average.len(), 21);
        assert_eq!(analysis.average, expected);
        assert_eq!(analysis.window_x.first(), Some(&40.0));
        assert_eq!(analysis.progression.points, vec![(0.0, 40.0), (1.0, 20.0)]);
    }

    #[test]
    fn progression_can_use_window_sums() {
        let session = SpectrumSession::new(vec![
            NamedSpectrum::new("a.csv", vec![1.0; 10]),
            NamedSpectrum::new("b.csv", vec![2.0; 10]),
        ]);
        let config = AnalysisConfig {
            metric: ProgressionMetric::WindowSum,
            step_size: Some(25.0),
            ..unit_config(2.0, 4.0)
        };
        let analysis = session.analyze(&config).unwrap();
        assert_eq!(analysis.sums, vec![3.0, 6.0]);
        assert_eq!(analysis.progression.points, vec![(0.0, 3.0), (25.0, 6.0)]);
    }

    #[test]
    fn mismatched_lengths_fail_before_any_result() {
        let session = SpectrumSession::new(vec![
            NamedSpectrum::new("a.csv", vec![1.0; 100]),
            NamedSpectrum::new("b.csv", vec![1.0; 90]),
        ]);
        match session.analyze(&unit_config(40.0, 60.0)) {
            Err(XrfError::Alignment { name, expected, found }) => {
                assert_eq!(name, "b.csv");
                assert_eq!((expected, found), (100, 90));
            }
            other => panic!("expected alignment error, got {other:?}"),
        }
    }

    #[test]
    fn empty_session_reports_empty_input() {
        let session = SpectrumSession::default();
        assert!(matches!(
            session.analyze(&AnalysisConfig::default()),
            Err(XrfError::EmptyInput)
        ));
        assert!(session.x_axis(10.0).is_empty());
    }

    #[test]
    fn zero_channel_spectra_are_a_degenerate_window() {
        let session = SpectrumSession::new(vec![NamedSpectrum::new("blank.csv", Vec::new())]);
        assert!(matches!(
            session.analyze(&AnalysisConfig::default()),
            Err(XrfError::DegenerateWindow { low: 0, high: 0 })
        ));
        assert!(matches!(
            window_to_indices(&[0.0, 10.0], f64::NAN, 10.0),
            Err(XrfError::DegenerateWindow { .. })
        ));
    }

    #[test]
    fn log_display_feeds_peaks_and_sums() {
        let session = SpectrumSession::new(vec![NamedSpectrum::new(
            "a.csv",
            vec![0.0, 1.0, 10.0, 0.0],
        )]);
        let config = AnalysisConfig {
            log_display: true,
            ..unit_config(0.0, 3.0)
        };
        let analysis = session.analyze(&config).unwrap();
        assert_eq!(analysis.peaks[0].index, 2);
        assert_eq!(analysis.peaks[0].value, 10f64.ln());
        assert_eq!(analysis.sums[0], 10f64.ln());
    }
}
