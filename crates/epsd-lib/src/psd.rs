//! Per-epoch, per-channel power spectral density estimation.
//!
//! Two estimators are available: a sine-taper multitaper estimate and a
//! Hann-windowed Welch average. Both return one-sided densities in
//! power-per-Hz units, restricted to a configured frequency range.

use crate::config::PsdMethod;
use anyhow::{anyhow, Result};
use ndarray::{s, Array1, Array3};
use realfft::{RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::sync::Arc;

/// Number of orthonormal sine tapers averaged by the multitaper method.
const N_TAPERS: usize = 8;

/// PSD of every epoch and channel over a restricted frequency axis.
#[derive(Debug, Clone)]
pub struct EpochSpectra {
    /// Shape (n_epochs, n_channels, n_freqs)
    pub psds: Array3<f64>,
    /// Frequency values in Hz, length n_freqs
    pub freqs: Array1<f64>,
}

/// Estimate the PSD of each epoch/channel of `epochs` (shape
/// (n_epochs, n_channels, n_samples)) over `[fmin, fmax]` Hz.
pub fn compute_epoch_psd(
    epochs: &Array3<f64>,
    fs: f64,
    method: PsdMethod,
    fmin: f64,
    fmax: f64,
) -> Result<EpochSpectra> {
    let (n_epochs, n_channels, n_samples) = epochs.dim();
    if n_samples == 0 {
        return Err(anyhow!("cannot estimate PSD of empty epochs"));
    }
    let frame_len = match method {
        PsdMethod::Multitaper => n_samples,
        PsdMethod::Welch => welch_segment_len(n_samples, fs),
    };
    let full_freqs = fft_freqs(frame_len, fs);
    let keep: Vec<usize> = full_freqs
        .iter()
        .enumerate()
        .filter(|(_, f)| **f >= fmin && **f <= fmax)
        .map(|(k, _)| k)
        .collect();
    if keep.is_empty() {
        return Err(anyhow!(
            "no frequency bins in [{fmin}, {fmax}] Hz at resolution {:.4} Hz",
            fs / frame_len as f64
        ));
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(frame_len);
    let tapers = match method {
        PsdMethod::Multitaper => sine_tapers(n_samples, N_TAPERS),
        PsdMethod::Welch => Vec::new(),
    };

    let mut psds = Array3::<f64>::zeros((n_epochs, n_channels, keep.len()));
    for e in 0..n_epochs {
        for ch in 0..n_channels {
            let signal: Vec<f64> = epochs.slice(s![e, ch, ..]).to_vec();
            let spectrum = match method {
                PsdMethod::Multitaper => multitaper_psd(&signal, fs, &tapers, &r2c),
                PsdMethod::Welch => welch_psd(&signal, fs, frame_len, &r2c),
            };
            for (out, &k) in keep.iter().enumerate() {
                psds[[e, ch, out]] = spectrum[k];
            }
        }
    }
    let freqs = Array1::from_iter(keep.iter().map(|&k| full_freqs[k]));
    Ok(EpochSpectra { psds, freqs })
}

fn fft_freqs(n: usize, fs: f64) -> Vec<f64> {
    (0..=n / 2).map(|k| k as f64 * fs / n as f64).collect()
}

/// One-sided scale factor: interior bins carry the mirrored half.
fn one_sided_factor(k: usize, n: usize) -> f64 {
    if k == 0 || (n % 2 == 0 && k == n / 2) {
        1.0
    } else {
        2.0
    }
}

/// Orthonormal sine tapers of Riedel & Sidorenko.
fn sine_tapers(n: usize, n_tapers: usize) -> Vec<Vec<f64>> {
    let norm = (2.0 / (n as f64 + 1.0)).sqrt();
    (0..n_tapers)
        .map(|k| {
            (0..n)
                .map(|t| {
                    norm * (PI * (k as f64 + 1.0) * (t as f64 + 1.0) / (n as f64 + 1.0)).sin()
                })
                .collect()
        })
        .collect()
}

/// Average of the tapered periodograms, full one-sided axis.
fn multitaper_psd(
    signal: &[f64],
    fs: f64,
    tapers: &[Vec<f64>],
    r2c: &Arc<dyn RealToComplex<f64>>,
) -> Vec<f64> {
    let n = signal.len();
    let mut powers = vec![0.0; n / 2 + 1];
    for taper in tapers {
        let mut frame: Vec<f64> = signal
            .iter()
            .zip(taper.iter())
            .map(|(x, w)| x * w)
            .collect();
        let mut spectrum = r2c.make_output_vec();
        r2c.process(&mut frame, &mut spectrum).unwrap();
        for (k, value) in spectrum.iter().enumerate() {
            powers[k] += value.norm_sqr() * one_sided_factor(k, n) / fs;
        }
    }
    let scale = 1.0 / tapers.len() as f64;
    for p in powers.iter_mut() {
        *p *= scale;
    }
    powers
}

fn welch_segment_len(n: usize, fs: f64) -> usize {
    ((fs * 2.0) as usize).max(8).min(n)
}

/// Hann-windowed averaged periodogram over 50%-overlapping segments.
fn welch_psd(signal: &[f64], fs: f64, window: usize, r2c: &Arc<dyn RealToComplex<f64>>) -> Vec<f64> {
    let n = signal.len();
    let step = (window / 2).max(1);
    let window_func = hann(window);
    let window_power: f64 = window_func.iter().map(|w| w * w).sum();
    let mut powers = vec![0.0; window / 2 + 1];
    let mut segments = 0;
    let mut pos = 0;
    while pos + window <= n {
        let mut frame: Vec<f64> = signal[pos..pos + window]
            .iter()
            .zip(window_func.iter())
            .map(|(x, w)| x * w)
            .collect();
        let mut spectrum = r2c.make_output_vec();
        r2c.process(&mut frame, &mut spectrum).unwrap();
        for (k, value) in spectrum.iter().enumerate() {
            powers[k] += value.norm_sqr() * one_sided_factor(k, window) / (fs * window_power);
        }
        segments += 1;
        pos += step;
    }
    if segments > 0 {
        for p in powers.iter_mut() {
            *p /= segments as f64;
        }
    }
    powers
}

fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size as f64)).cos()))
        .collect()
}
