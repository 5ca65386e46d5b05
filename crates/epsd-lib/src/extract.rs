//! Stage 1: turn a subject's raw recordings into an epoch PSD archive.

use crate::archive::PsdArchive;
use crate::config::AnalysisConfig;
use crate::dataset;
use crate::epoch::{epoch_recording, EpochWindow};
use crate::io::{edf, events};
use crate::psd::{compute_epoch_psd, EpochSpectra};
use anyhow::{Context, Result};
use log::warn;
use ndarray::{concatenate, Array1, Axis};
use std::path::Path;

/// Result of processing one subject.
#[derive(Debug)]
pub enum SubjectOutcome {
    /// Archive ready to persist.
    Archive(PsdArchive),
    /// A configured condition had no recordings; nothing is written.
    MissingCondition(String),
    /// Every file failed or yielded zero epochs; nothing is written.
    NoEpochs,
}

/// Gather every condition/run of one subject into an archive.
///
/// Individual files that fail to load, have no marker events, or yield
/// zero epochs contribute nothing and are only logged; a condition with
/// no files at all aborts the subject.
pub fn extract_subject(
    cfg: &AnalysisConfig,
    subject_dir: &Path,
    subject_id: &str,
) -> Result<SubjectOutcome> {
    let mut psd_blocks = Vec::new();
    let mut labels: Vec<String> = Vec::new();
    let mut run_labels: Vec<String> = Vec::new();
    let mut freqs: Option<Array1<f64>> = None;
    let mut channels: Option<Vec<String>> = None;

    for condition in &cfg.conditions {
        let files = dataset::condition_files(subject_dir, subject_id, condition)?;
        if files.is_empty() {
            return Ok(SubjectOutcome::MissingCondition(condition.clone()));
        }
        for file in files {
            match process_file(cfg, &file.path) {
                Ok(Some(file_spectra)) => {
                    let n_epochs = file_spectra.psd.psds.shape()[0];
                    labels.extend(std::iter::repeat(condition.clone()).take(n_epochs));
                    run_labels.extend(std::iter::repeat(file.run_id.clone()).take(n_epochs));
                    if channels.is_none() {
                        channels = Some(file_spectra.channels.clone());
                        freqs = Some(file_spectra.psd.freqs.clone());
                    }
                    psd_blocks.push(file_spectra.psd.psds);
                }
                Ok(None) => {
                    warn!("no epochs in {}", file.path.display());
                }
                Err(err) => {
                    warn!("error processing file {}: {err:#}", file.path.display());
                }
            }
        }
    }

    if psd_blocks.is_empty() {
        return Ok(SubjectOutcome::NoEpochs);
    }
    let (channels, freqs) = match (channels, freqs) {
        (Some(channels), Some(freqs)) => (channels, freqs),
        _ => return Ok(SubjectOutcome::NoEpochs),
    };

    let views: Vec<_> = psd_blocks.iter().map(|block| block.view()).collect();
    let epoch_psds = concatenate(Axis(0), &views).context("concatenating epoch PSD blocks")?;
    let archive = PsdArchive::from_epochs(
        epoch_psds,
        labels,
        run_labels,
        freqs,
        channels,
        cfg.conditions.clone(),
    )?;
    Ok(SubjectOutcome::Archive(archive))
}

struct FileSpectra {
    psd: EpochSpectra,
    channels: Vec<String>,
}

/// Load one recording, epoch it around the configured marker, and
/// estimate per-epoch PSDs. `None` means the file produced no epochs.
fn process_file(cfg: &AnalysisConfig, path: &Path) -> Result<Option<FileSpectra>> {
    let recording = edf::load_edf_recording(path)?;
    let sidecar = events::sidecar_events_path(path);
    let event_rows = events::load_events_tsv(&sidecar)?;
    let markers = events::marker_indices(&event_rows, &cfg.marker, recording.fs);
    let window = EpochWindow {
        tmin: cfg.tmin,
        tmax: cfg.tmax,
        baseline: cfg.baseline,
    };
    let epochs = epoch_recording(&recording, &markers, &window);
    if epochs.shape()[0] == 0 {
        return Ok(None);
    }
    let psd = compute_epoch_psd(&epochs, recording.fs, cfg.psd_method, cfg.fmin, cfg.fmax)?;
    Ok(Some(FileSpectra {
        psd,
        channels: recording.channels,
    }))
}
