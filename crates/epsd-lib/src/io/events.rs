//! BIDS `events.tsv` sidecars.
//!
//! Marker events for a recording live in a tab-separated file next to
//! the EDF, sharing its basename (`..._eeg.edf` -> `..._events.tsv`).

use crate::signal::Markers;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One row of an `events.tsv` file.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkerEvent {
    /// Onset in seconds from recording start.
    pub onset: f64,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub trial_type: Option<String>,
}

/// Load all rows of a BIDS `events.tsv` file.
pub fn load_events_tsv(path: &Path) -> Result<Vec<MarkerEvent>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(Trim::All)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut events = Vec::new();
    for (idx, row) in reader.deserialize::<MarkerEvent>().enumerate() {
        let event = row.with_context(|| format!("parsing event row {} of {}", idx + 1, path.display()))?;
        events.push(event);
    }
    Ok(events)
}

/// Sample indices of the events whose `trial_type` equals `marker`.
pub fn marker_indices(events: &[MarkerEvent], marker: &str, fs: f64) -> Markers {
    let onsets: Vec<f64> = events
        .iter()
        .filter(|event| event.trial_type.as_deref() == Some(marker))
        .map(|event| event.onset)
        .collect();
    Markers::from_onsets(&onsets, fs)
}

/// Path of the events sidecar belonging to an EEG recording file.
pub fn sidecar_events_path(eeg_path: &Path) -> PathBuf {
    let name = eeg_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = name.strip_suffix("_eeg.edf").unwrap_or(name);
    eeg_path.with_file_name(format!("{stem}_events.tsv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_events(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub-01_pre_run-01_events.tsv");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{contents}").unwrap();
        (dir, path)
    }

    #[test]
    fn parses_events_and_filters_markers() {
        let (_dir, path) = write_events(
            "onset\tduration\ttrial_type\n0.5\t0.0\t1\n2.0\t0.0\t2\n4.0\t0.0\t2\n6.0\t0.0\tboundary\n",
        );
        let events = load_events_tsv(&path).unwrap();
        assert_eq!(events.len(), 4);
        let markers = marker_indices(&events, "2", 250.0);
        assert_eq!(markers.indices, vec![500, 1000]);
    }

    #[test]
    fn missing_trial_type_rows_are_ignored_by_filter() {
        let (_dir, path) = write_events("onset\tduration\ttrial_type\n1.0\t0.0\t\n");
        let events = load_events_tsv(&path).unwrap();
        let markers = marker_indices(&events, "2", 100.0);
        assert!(markers.is_empty());
    }

    #[test]
    fn sidecar_path_replaces_modality_suffix() {
        let eeg = Path::new("/data/sub-01/ses-01/eeg/sub-01_pre_run-01_eeg.edf");
        assert_eq!(
            sidecar_events_path(eeg),
            Path::new("/data/sub-01/ses-01/eeg/sub-01_pre_run-01_events.tsv")
        );
    }
}
