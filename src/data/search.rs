// ---------------------------------------------------------------------------
// Index / search helpers shared by the raster engine and the session
// ---------------------------------------------------------------------------

/// Index of the sample in `axis` closest to `target`.
///
/// Ties resolve to the lower index. Returns `None` for an empty axis or a
/// NaN target.
pub fn nearest_index(axis: &[f64], target: f64) -> Option<usize> {
    if target.is_nan() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in axis.iter().enumerate() {
        let dist = (v - target).abs();
        match best {
            Some((_, d)) if dist >= d => {}
            _ => best = Some((i, dist)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the first maximum in `values`. NaN entries are skipped.
pub fn first_argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, m)) if v <= m => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Natural log for display: non-positive input maps to exactly 0.
///
/// The result is only meant for plotting; 0 here does not mean "one count".
pub fn log_clamped(y: f64) -> f64 {
    if y > 0.0 {
        y.ln()
    } else {
        0.0
    }
}

/// `0, s, 2s, ...` when `scale` is non-zero, otherwise `0, 1, 2, ...`.
pub fn scaled_ordinals(n: usize, scale: Option<f64>) -> Vec<f64> {
    let step = match scale {
        Some(s) if s != 0.0 => s,
        _ => 1.0,
    };
    (0..n).map(|i| i as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_index_exact_hit() {
        let axis = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(nearest_index(&axis, 20.0), Some(2));
    }

    #[test]
    fn nearest_index_picks_closest_sample() {
        let axis = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(nearest_index(&axis, 13.0), Some(1));
        assert_eq!(nearest_index(&axis, 27.5), Some(3));
        assert_eq!(nearest_index(&axis, -40.0), Some(0));
        assert_eq!(nearest_index(&axis, 1e9), Some(3));
    }

    #[test]
    fn nearest_index_tie_goes_to_lower_index() {
        let axis = [0.0, 10.0, 20.0];
        assert_eq!(nearest_index(&axis, 15.0), Some(1));
        assert_eq!(nearest_index(&axis, 5.0), Some(0));
    }

    #[test]
    fn nearest_index_on_empty_or_nan() {
        assert_eq!(nearest_index(&[], 1.0), None);
        assert_eq!(nearest_index(&[1.0], f64::NAN), None);
    }

    #[test]
    fn first_argmax_prefers_first_of_repeated_maxima() {
        assert_eq!(first_argmax(&[1.0, 5.0, 2.0, 5.0, 5.0]), Some(1));
        assert_eq!(first_argmax(&[3.0, 3.0, 3.0]), Some(0));
        assert_eq!(first_argmax(&[f64::NAN, 2.0, 1.0]), Some(1));
        assert_eq!(first_argmax(&[]), None);
    }

    #[test]
    fn log_clamped_is_total() {
        assert_eq!(log_clamped(0.0), 0.0);
        assert_eq!(log_clamped(-3.0), 0.0);
        assert_eq!(log_clamped(f64::NAN), 0.0);
        assert!((log_clamped(std::f64::consts::E) - 1.0).abs() < 1e-12);
        assert_eq!(log_clamped(0.5), 0.5f64.ln());
    }

    #[test]
    fn scaled_ordinals_fallback() {
        assert_eq!(scaled_ordinals(3, None), vec![0.0, 1.0, 2.0]);
        assert_eq!(scaled_ordinals(3, Some(0.0)), vec![0.0, 1.0, 2.0]);
        assert_eq!(scaled_ordinals(3, Some(2.5)), vec![0.0, 2.5, 5.0]);
    }
}
