//! Stage 3: two-stage dimensionality reduction of epoch features.
//!
//! Feature vectors are optionally restricted to a frequency sub-band,
//! embedded with UMAP to an intermediate dimensionality, then projected
//! to three principal components for the interactive scatter.

pub mod pca;
pub mod umap;

use crate::archive::PsdArchive;
use crate::config::{AnalysisConfig, FreqBand};
use anyhow::{anyhow, ensure, Result};
use ndarray::{Array1, Array2, Axis};

pub use umap::UmapParams;

/// One epoch in the display table of the 3D scatter.
#[derive(Debug, Clone, PartialEq)]
pub struct DrPoint {
    pub coords: [f64; 3],
    pub condition: String,
    pub run: String,
    /// `<condition>_<run>`, used for marker-symbol differentiation.
    pub condition_run: String,
}

/// Result of reducing one subject.
#[derive(Debug)]
pub enum DrOutcome {
    Embedded(Vec<DrPoint>),
    /// The selected band covers none of the archive's frequencies.
    EmptyBand { band: String, fmin: f64, fmax: f64 },
    /// Below the epoch floor for the configured neighbor count.
    TooFewEpochs { n_epochs: usize, required: usize },
}

/// Indices of the frequency bins inside a band's inclusive bounds.
pub fn band_indices(freqs: &Array1<f64>, band: &FreqBand) -> Vec<usize> {
    freqs
        .iter()
        .enumerate()
        .filter(|(_, f)| **f >= band.fmin && **f <= band.fmax)
        .map(|(i, _)| i)
        .collect()
}

/// Restrict flattened (epoch, channel x freq) features to one band.
///
/// The matrix is reshaped to (epoch, channel, freq), the in-band bins
/// are kept, and the result re-flattened. `None` when the band covers
/// no bins.
pub fn select_band(
    data: &Array2<f64>,
    freqs: &Array1<f64>,
    n_channels: usize,
    band: &FreqBand,
) -> Option<Array2<f64>> {
    let keep = band_indices(freqs, band);
    if keep.is_empty() {
        return None;
    }
    let n_epochs = data.nrows();
    let n_freqs = freqs.len();
    let mut out = Array2::<f64>::zeros((n_epochs, n_channels * keep.len()));
    for e in 0..n_epochs {
        for ch in 0..n_channels {
            for (col, &f) in keep.iter().enumerate() {
                out[[e, ch * keep.len() + col]] = data[[e, ch * n_freqs + f]];
            }
        }
    }
    Some(out)
}

/// Run the full reduction for one archive.
///
/// Epochs are first filtered to the configured condition set; the band
/// restriction and the epoch floor may skip the subject, reported as
/// the corresponding [`DrOutcome`] variant.
pub fn reduce_archive(
    archive: &PsdArchive,
    cfg: &AnalysisConfig,
    band_name: &str,
    umap_components: usize,
    umap_neighbors: usize,
) -> Result<DrOutcome> {
    ensure!(
        cfg.pca_components >= 3,
        "pca_components must be at least 3 for the 3D scatter"
    );

    let keep: Vec<usize> = archive
        .labels
        .iter()
        .enumerate()
        .filter(|(_, label)| cfg.conditions.contains(label))
        .map(|(i, _)| i)
        .collect();
    let mut features = archive.data_for_dr.select(Axis(0), &keep);
    let labels: Vec<String> = keep.iter().map(|&i| archive.labels[i].clone()).collect();
    let runs: Vec<String> = keep.iter().map(|&i| archive.run_labels[i].clone()).collect();

    if band_name != "ALL" {
        let band = cfg
            .band(band_name)
            .ok_or_else(|| anyhow!("unknown frequency band {band_name}"))?;
        match select_band(&features, &archive.freqs, archive.n_channels(), band) {
            Some(selected) => features = selected,
            None => {
                return Ok(DrOutcome::EmptyBand {
                    band: band.name.clone(),
                    fmin: band.fmin,
                    fmax: band.fmax,
                });
            }
        }
    }

    let n_epochs = features.nrows();
    let required = 2 * umap_neighbors;
    if n_epochs < required {
        return Ok(DrOutcome::TooFewEpochs { n_epochs, required });
    }

    let params = UmapParams::new(umap_components, umap_neighbors, cfg.umap_seed);
    let embedded = umap::embed(&features, &params);
    let projected = pca::fit_transform(&embedded, cfg.pca_components);

    let points = labels
        .into_iter()
        .zip(runs)
        .enumerate()
        .map(|(i, (condition, run))| DrPoint {
            coords: [projected[[i, 0]], projected[[i, 1]], projected[[i, 2]]],
            condition_run: format!("{condition}_{run}"),
            condition,
            run,
        })
        .collect();
    Ok(DrOutcome::Embedded(points))
}
