//! Per-subject epoch PSD archives.
//!
//! One archive per subject holds the flattened feature matrix, the
//! unflattened PSD tensor, the per-epoch condition/run labels, and the
//! channel/frequency axes. Archives are zstd-compressed JSON and are
//! validated against their shape invariants both when written and when
//! read back.

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filename suffix of every subject archive.
pub const ARCHIVE_SUFFIX: &str = "_epoch_psd_data.json.zst";

const ZSTD_LEVEL: i32 = 3;

/// Violation of the archive shape invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("epoch counts disagree: data_for_dr {flat}, epoch_psds {tensor}, labels {labels}, run_labels {runs}")]
    EpochCountMismatch {
        flat: usize,
        tensor: usize,
        labels: usize,
        runs: usize,
    },
    #[error("feature width {flat} does not equal {channels} channels x {freqs} frequency bins")]
    FeatureWidthMismatch {
        flat: usize,
        channels: usize,
        freqs: usize,
    },
    #[error("flattened features diverge from the PSD tensor at epoch {epoch}")]
    FlattenMismatch { epoch: usize },
    #[error("frequency axis has {axis} values but the PSD tensor has {tensor} bins")]
    FreqAxisMismatch { axis: usize, tensor: usize },
    #[error("channel list has {list} names but the PSD tensor has {tensor} channels")]
    ChannelListMismatch { list: usize, tensor: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsdArchive {
    /// Flattened features, shape (n_epochs, n_channels * n_freqs).
    pub data_for_dr: Array2<f64>,
    /// PSD tensor, shape (n_epochs, n_channels, n_freqs).
    pub epoch_psds: Array3<f64>,
    /// Condition name per epoch.
    pub labels: Vec<String>,
    /// Run identifier per epoch.
    pub run_labels: Vec<String>,
    /// Frequency axis in Hz.
    pub freqs: Array1<f64>,
    /// Channel names.
    pub channels: Vec<String>,
    /// Conditions this archive was built against.
    pub conditions: Vec<String>,
}

impl PsdArchive {
    /// Build an archive from the PSD tensor, deriving the flattened
    /// feature matrix.
    pub fn from_epochs(
        epoch_psds: Array3<f64>,
        labels: Vec<String>,
        run_labels: Vec<String>,
        freqs: Array1<f64>,
        channels: Vec<String>,
        conditions: Vec<String>,
    ) -> Result<Self> {
        let (n_epochs, n_channels, n_freqs) = epoch_psds.dim();
        let flat: Vec<f64> = epoch_psds.iter().copied().collect();
        let data_for_dr = Array2::from_shape_vec((n_epochs, n_channels * n_freqs), flat)
            .context("flattening epoch PSDs")?;
        let archive = Self {
            data_for_dr,
            epoch_psds,
            labels,
            run_labels,
            freqs,
            channels,
            conditions,
        };
        archive.validate()?;
        Ok(archive)
    }

    pub fn n_epochs(&self) -> usize {
        self.epoch_psds.shape()[0]
    }

    pub fn n_channels(&self) -> usize {
        self.epoch_psds.shape()[1]
    }

    pub fn n_freqs(&self) -> usize {
        self.epoch_psds.shape()[2]
    }

    /// Check every shape and alignment invariant.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        let (n_epochs, n_channels, n_freqs) = self.epoch_psds.dim();
        if self.data_for_dr.nrows() != n_epochs
            || self.labels.len() != n_epochs
            || self.run_labels.len() != n_epochs
        {
            return Err(ArchiveError::EpochCountMismatch {
                flat: self.data_for_dr.nrows(),
                tensor: n_epochs,
                labels: self.labels.len(),
                runs: self.run_labels.len(),
            });
        }
        if self.data_for_dr.ncols() != n_channels * n_freqs {
            return Err(ArchiveError::FeatureWidthMismatch {
                flat: self.data_for_dr.ncols(),
                channels: n_channels,
                freqs: n_freqs,
            });
        }
        for e in 0..n_epochs {
            let tensor_row = self.epoch_psds.index_axis(ndarray::Axis(0), e);
            let flat_row = self.data_for_dr.row(e);
            if tensor_row.iter().ne(flat_row.iter()) {
                return Err(ArchiveError::FlattenMismatch { epoch: e });
            }
        }
        if self.freqs.len() != n_freqs {
            return Err(ArchiveError::FreqAxisMismatch {
                axis: self.freqs.len(),
                tensor: n_freqs,
            });
        }
        if self.channels.len() != n_channels {
            return Err(ArchiveError::ChannelListMismatch {
                list: self.channels.len(),
                tensor: n_channels,
            });
        }
        Ok(())
    }

    /// Validate and write the archive as zstd-compressed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let json = serde_json::to_vec(self).context("serializing archive")?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)
            .context("compressing archive")?;
        fs::write(path, compressed)
            .with_context(|| format!("writing archive {}", path.display()))?;
        Ok(())
    }

    /// Read an archive back and re-validate its invariants.
    pub fn load(path: &Path) -> Result<Self> {
        let compressed =
            fs::read(path).with_context(|| format!("reading archive {}", path.display()))?;
        let json = zstd::decode_all(compressed.as_slice())
            .with_context(|| format!("decompressing archive {}", path.display()))?;
        let archive: Self = serde_json::from_slice(&json)
            .with_context(|| format!("parsing archive {}", path.display()))?;
        archive.validate()?;
        Ok(archive)
    }
}

/// Archive path for one subject inside the PSD data directory.
pub fn archive_path(psd_data_dir: &Path, subject_id: &str) -> PathBuf {
    psd_data_dir.join(format!("{subject_id}{ARCHIVE_SUFFIX}"))
}

/// All `(subject_id, path)` archives in a directory, sorted by subject.
pub fn list_archives(psd_data_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut archives = Vec::new();
    let entries = fs::read_dir(psd_data_dir)
        .with_context(|| format!("listing {}", psd_data_dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = match entry.file_name().to_str() {
            Some(name) => name.to_string(),
            None => continue,
        };
        if let Some(subject_id) = name.strip_suffix(ARCHIVE_SUFFIX) {
            archives.push((subject_id.to_string(), entry.path()));
        }
    }
    archives.sort();
    Ok(archives)
}
