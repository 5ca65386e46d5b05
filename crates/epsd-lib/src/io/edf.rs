use crate::signal::Recording;
use anyhow::{anyhow, Result};
use edf_reader::file_reader::SyncFileReader;
use edf_reader::sync_reader::SyncEDFReader;
use ndarray::Array2;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Helper implementing the EDF reader trait for on-disk files.
struct DiskFileReader {
    path: PathBuf,
}

impl DiskFileReader {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl SyncFileReader for DiskFileReader {
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, std::io::Error> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Load every channel of an EDF recording into a [`Recording`].
///
/// All channels must share one sampling rate; mixed-rate files are
/// rejected rather than resampled.
pub fn load_edf_recording(path: &Path) -> Result<Recording> {
    let reader = SyncEDFReader::init_with_file_reader(DiskFileReader::new(path))?;
    let header = &reader.edf_header;
    if header.channels.is_empty() {
        return Err(anyhow!("EDF file {} has no channels", path.display()));
    }
    let samples_per_block = header.channels[0].number_of_samples_in_data_record;
    for channel in &header.channels {
        if channel.number_of_samples_in_data_record != samples_per_block {
            return Err(anyhow!(
                "EDF file {} mixes sampling rates across channels",
                path.display()
            ));
        }
    }
    let total_duration = header.block_duration * header.number_of_blocks;
    let data_matrix = reader.read_data_window(0, total_duration)?;

    let fs = samples_per_block as f64 * 1000.0 / header.block_duration as f64;
    let n_channels = header.channels.len();
    let n_samples = data_matrix
        .first()
        .map(|channel| channel.len())
        .unwrap_or(0);
    let mut data = Array2::<f64>::zeros((n_channels, n_samples));
    for (ch, samples) in data_matrix.iter().enumerate() {
        if samples.len() != n_samples {
            return Err(anyhow!(
                "channel {} of {} has {} samples, expected {}",
                ch,
                path.display(),
                samples.len(),
                n_samples
            ));
        }
        for (t, value) in samples.iter().enumerate() {
            data[[ch, t]] = *value as f64;
        }
    }
    let channels = header
        .channels
        .iter()
        .map(|channel| channel.label.trim().to_string())
        .collect();
    Ok(Recording { fs, data, channels })
}
