use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Continuous multichannel recording, channels x samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Signal values, shape (n_channels, n_samples)
    pub data: Array2<f64>,
    /// Channel names, one per row of `data`
    pub channels: Vec<String>,
}

impl Recording {
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }
    pub fn duration(&self) -> f64 {
        self.data.ncols() as f64 / self.fs
    }
}

/// Marker positions on a recording's sample axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Markers {
    pub indices: Vec<usize>,
}

impl Markers {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    /// Convert marker onsets in seconds to sample indices.
    pub fn from_onsets(onsets: &[f64], fs: f64) -> Self {
        let indices = onsets
            .iter()
            .map(|onset| (onset * fs).round() as usize)
            .collect();
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
