//! Analysis configuration.
//!
//! [`AnalysisConfig`] collects every tunable parameter of the three
//! pipeline stages. The compiled-in defaults describe the reference
//! study (pre/post/follow sessions, marker "2", 3–35 Hz multitaper PSD);
//! a partial TOML file can override any subset of fields.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-epoch PSD estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsdMethod {
    /// Sine-taper multitaper estimate.
    Multitaper,
    /// Hann-windowed averaged periodogram.
    Welch,
}

/// Named frequency sub-band with inclusive bounds in Hz.
#[derive(Debug, Clone, Deserialize)]
pub struct FreqBand {
    pub name: String,
    pub fmin: f64,
    pub fmax: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Experimental conditions, in processing order.
    pub conditions: Vec<String>,
    /// Subject directory names to process; empty means every `sub-*`
    /// directory under the data root.
    pub subject_dirs: Vec<String>,
    /// Marker value (`trial_type` in the events sidecar) that anchors
    /// an epoch.
    pub marker: String,
    /// Epoch window start relative to the marker, seconds.
    pub tmin: f64,
    /// Epoch window end relative to the marker, seconds.
    pub tmax: f64,
    /// Baseline-correction interval relative to the marker, seconds.
    pub baseline: (f64, f64),
    pub psd_method: PsdMethod,
    /// Lower PSD frequency bound, Hz.
    pub fmin: f64,
    /// Upper PSD frequency bound, Hz.
    pub fmax: f64,
    pub freq_bands: Vec<FreqBand>,
    /// Band the DR stage restricts features to ("ALL" keeps everything).
    pub dr_band: String,
    /// Intermediate dimensionality of the manifold embedding.
    pub umap_components: usize,
    pub umap_neighbors: usize,
    pub umap_seed: u64,
    pub pca_components: usize,
    /// Per-run line colours, zipped against `conditions` by index.
    pub run_colors: Vec<String>,
    /// Condition-mean line colours, zipped against `conditions` by index.
    pub mean_colors: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            conditions: vec!["pre".into(), "post".into(), "follow".into()],
            subject_dirs: Vec::new(),
            marker: "2".into(),
            tmin: -3.0,
            tmax: 7.0,
            baseline: (-3.0, 0.0),
            psd_method: PsdMethod::Multitaper,
            fmin: 3.0,
            fmax: 35.0,
            freq_bands: vec![
                FreqBand { name: "ALL".into(), fmin: 3.0, fmax: 35.0 },
                FreqBand { name: "THETA".into(), fmin: 4.0, fmax: 7.0 },
                FreqBand { name: "ALPHA".into(), fmin: 9.0, fmax: 13.0 },
                FreqBand { name: "BETA".into(), fmin: 14.0, fmax: 35.0 },
            ],
            dr_band: "ALL".into(),
            umap_components: 100,
            umap_neighbors: 20,
            umap_seed: 42,
            pca_components: 3,
            run_colors: vec!["#6A5ACD".into(), "#3CB371".into(), "#FF8C00".into()],
            mean_colors: vec!["#483D8B".into(), "#2E8B57".into(), "#CC5500".into()],
        }
    }
}

impl AnalysisConfig {
    /// Load a (possibly partial) configuration from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: AnalysisConfig = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn band(&self, name: &str) -> Option<&FreqBand> {
        self.freq_bands.iter().find(|band| band.name == name)
    }

    pub fn run_color(&self, condition: &str) -> Option<&str> {
        let idx = self.conditions.iter().position(|c| c == condition)?;
        self.run_colors.get(idx).map(|s| s.as_str())
    }

    pub fn mean_color(&self, condition: &str) -> Option<&str> {
        let idx = self.conditions.iter().position(|c| c == condition)?;
        self.mean_colors.get(idx).map(|s| s.as_str())
    }
}

/// Default results root, relative to the working directory.
pub fn default_results_dir() -> PathBuf {
    PathBuf::from("PSD_ANALYSIS_RESULTS")
}

/// Subdirectory holding the per-subject PSD archives.
pub fn psd_data_dir(results_root: &Path) -> PathBuf {
    results_root.join("PSD_DATA")
}

/// Subdirectory holding the static PSD figures.
pub fn psd_plots_dir(results_root: &Path) -> PathBuf {
    results_root.join("PSD_PLOTS")
}

/// Subdirectory holding the interactive dimensionality-reduction plots.
pub fn dr_plots_dir(results_root: &Path) -> PathBuf {
    results_root.join("DR_PLOTS")
}
