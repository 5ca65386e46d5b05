//! Marker-anchored epoching with baseline correction.

use crate::signal::{Markers, Recording};
use ndarray::{s, Array3};

/// Epoch window relative to a marker, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct EpochWindow {
    pub tmin: f64,
    pub tmax: f64,
    /// Baseline-correction interval; must lie within `[tmin, tmax]`.
    pub baseline: (f64, f64),
}

impl EpochWindow {
    pub fn n_samples(&self, fs: f64) -> usize {
        let offset_min = (self.tmin * fs).round() as i64;
        let offset_max = (self.tmax * fs).round() as i64;
        (offset_max - offset_min + 1).max(0) as usize
    }
}

/// Cut `[tmin, tmax]` windows around each marker and subtract the
/// per-channel baseline mean.
///
/// Markers whose window does not fit inside the recording are dropped.
/// Returns shape (n_epochs, n_channels, n_samples); zero epochs when no
/// marker window fits.
pub fn epoch_recording(rec: &Recording, markers: &Markers, window: &EpochWindow) -> Array3<f64> {
    let fs = rec.fs;
    let offset_min = (window.tmin * fs).round() as i64;
    let epoch_len = window.n_samples(fs);
    let n_channels = rec.n_channels();
    let n_samples = rec.n_samples() as i64;

    let mut starts = Vec::new();
    for &marker in &markers.indices {
        let start = marker as i64 + offset_min;
        let end = start + epoch_len as i64;
        if start < 0 || end > n_samples {
            continue;
        }
        starts.push(start as usize);
    }

    let mut epochs = Array3::<f64>::zeros((starts.len(), n_channels, epoch_len));
    for (e, &start) in starts.iter().enumerate() {
        epochs
            .slice_mut(s![e, .., ..])
            .assign(&rec.data.slice(s![.., start..start + epoch_len]));
    }
    baseline_correct_inplace(&mut epochs, window, fs);
    epochs
}

/// Subtract the mean of the baseline interval from every channel of
/// every epoch.
fn baseline_correct_inplace(epochs: &mut Array3<f64>, window: &EpochWindow, fs: f64) {
    let epoch_len = epochs.shape()[2];
    let b0 = (((window.baseline.0 - window.tmin) * fs).round().max(0.0)) as usize;
    let b1 = ((((window.baseline.1 - window.tmin) * fs).round() as usize) + 1).min(epoch_len);
    if b0 >= b1 {
        return;
    }
    let (n_epochs, n_channels, _) = epochs.dim();
    for e in 0..n_epochs {
        for ch in 0..n_channels {
            let mean = epochs
                .slice(s![e, ch, b0..b1])
                .mean()
                .unwrap_or(0.0);
            epochs
                .slice_mut(s![e, ch, ..])
                .mapv_inplace(|v| v - mean);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn recording(n_channels: usize, n_samples: usize, fs: f64) -> Recording {
        let data = Array2::from_shape_fn((n_channels, n_samples), |(ch, t)| {
            ch as f64 * 1000.0 + t as f64
        });
        Recording {
            fs,
            data,
            channels: (0..n_channels).map(|i| format!("ch{i}")).collect(),
        }
    }

    #[test]
    fn window_sample_count_is_inclusive() {
        let window = EpochWindow {
            tmin: -3.0,
            tmax: 7.0,
            baseline: (-3.0, 0.0),
        };
        assert_eq!(window.n_samples(100.0), 1001);
    }

    #[test]
    fn epochs_out_of_bounds_are_dropped() {
        let rec = recording(2, 1000, 100.0);
        let window = EpochWindow {
            tmin: -1.0,
            tmax: 1.0,
            baseline: (-1.0, 0.0),
        };
        // first marker needs 100 samples of pre-window, last needs 100 post
        let markers = Markers::from_indices(vec![50, 500, 950]);
        let epochs = epoch_recording(&rec, &markers, &window);
        assert_eq!(epochs.dim(), (1, 2, 201));
    }

    #[test]
    fn baseline_mean_is_removed() {
        let rec = recording(1, 400, 100.0);
        let window = EpochWindow {
            tmin: -0.5,
            tmax: 0.5,
            baseline: (-0.5, 0.0),
        };
        let markers = Markers::from_indices(vec![200]);
        let epochs = epoch_recording(&rec, &markers, &window);
        assert_eq!(epochs.dim(), (1, 1, 101));
        // baseline covers samples 150..=200 of a ramp, mean 175
        let expected_first = 150.0 - 175.0;
        assert!((epochs[[0, 0, 0]] - expected_first).abs() < 1e-9);
        let baseline_mean: f64 = (0..51).map(|i| epochs[[0, 0, i]]).sum::<f64>() / 51.0;
        assert!(baseline_mean.abs() < 1e-9);
    }

    #[test]
    fn no_markers_yields_zero_epochs() {
        let rec = recording(3, 100, 50.0);
        let window = EpochWindow {
            tmin: -0.2,
            tmax: 0.2,
            baseline: (-0.2, 0.0),
        };
        let epochs = epoch_recording(&rec, &Markers::from_indices(vec![]), &window);
        assert_eq!(epochs.shape()[0], 0);
    }
}
