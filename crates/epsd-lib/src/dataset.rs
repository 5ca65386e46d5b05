//! Discovery of subjects, conditions and runs on disk.
//!
//! Recordings follow a BIDS-flavoured layout:
//! `<data_root>/<subject-dir>/ses-*/eeg/<subject-id>_<condition>_*_eeg.edf`
//! with the marker events in a sibling `*_events.tsv`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const EEG_SUFFIX: &str = "_eeg.edf";

/// One discovered recording file with its parsed run identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingFile {
    pub path: PathBuf,
    pub run_id: String,
}

/// Subject directory names to process, sorted.
///
/// An explicit non-empty list is taken as-is; otherwise every `sub-*`
/// directory under the data root is a candidate.
pub fn discover_subject_dirs(data_root: &Path, configured: &[String]) -> Result<Vec<String>> {
    let explicit: Vec<String> = configured
        .iter()
        .filter(|name| !name.is_empty())
        .cloned()
        .collect();
    let mut dirs = if explicit.is_empty() {
        let entries = fs::read_dir(data_root)
            .with_context(|| format!("listing data root {}", data_root.display()))?;
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with("sub-") {
                    found.push(name.to_string());
                }
            }
        }
        found
    } else {
        explicit
    };
    dirs.sort();
    Ok(dirs)
}

/// Extract the `sub-<digits>` identifier embedded in a directory name.
pub fn subject_id_of(dir_name: &str) -> Option<String> {
    let pos = dir_name.find("sub-")?;
    let digits: String = dir_name[pos + 4..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("sub-{digits}"))
    }
}

/// All recordings of one condition for a subject, sorted by path.
///
/// A file matches when its name reads
/// `<subject_id>_<condition>_<anything>_eeg.edf` inside a `ses-*/eeg`
/// directory.
pub fn condition_files(
    subject_dir: &Path,
    subject_id: &str,
    condition: &str,
) -> Result<Vec<RecordingFile>> {
    let prefix = format!("{subject_id}_{condition}_");
    let mut files = Vec::new();
    let sessions = fs::read_dir(subject_dir)
        .with_context(|| format!("listing subject directory {}", subject_dir.display()))?;
    for session in sessions {
        let session = session?;
        let session_path = session.path();
        let is_session = session
            .file_name()
            .to_str()
            .map(|name| name.starts_with("ses-"))
            .unwrap_or(false);
        if !session_path.is_dir() || !is_session {
            continue;
        }
        let eeg_dir = session_path.join("eeg");
        if !eeg_dir.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&eeg_dir)
            .with_context(|| format!("listing {}", eeg_dir.display()))?
        {
            let entry = entry?;
            let name = match entry.file_name().to_str() {
                Some(name) => name.to_string(),
                None => continue,
            };
            if name.starts_with(&prefix)
                && name.ends_with(EEG_SUFFIX)
                && name.len() >= prefix.len() + EEG_SUFFIX.len()
            {
                files.push(RecordingFile {
                    run_id: run_id_from_name(&name),
                    path: entry.path(),
                });
            }
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Parse the `_run-<digits>` token of a filename; `run-NA` when absent.
pub fn run_id_from_name(name: &str) -> String {
    if let Some(pos) = name.find("_run-") {
        let digits: String = name[pos + 5..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() {
            return format!("run-{digits}");
        }
    }
    "run-NA".to_string()
}
