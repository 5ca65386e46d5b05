//! Shared fixtures for the CLI integration tests: a minimal EDF writer,
//! BIDS events sidecars, and synthetic archives.

#![allow(dead_code)]

use epsd_lib::archive::PsdArchive;
use ndarray::{Array1, Array3};
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed-width ASCII header field, right-padded with spaces.
fn field(value: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    for ch in value.chars().take(width) {
        out.push(ch);
    }
    while out.len() < width {
        out.push(' ');
    }
    out
}

/// Write a valid EDF file with 1-second data records and per-channel
/// sine signals (distinct frequency per channel).
pub fn write_edf(path: &Path, channels: &[&str], fs: usize, seconds: usize) {
    let n_sig = channels.len();
    let mut header = String::new();
    header += &field("0", 8); // version
    header += &field("X X X X", 80); // patient
    header += &field("Startdate 01-JAN-2024 X X X", 80); // recording
    header += &field("01.01.24", 8);
    header += &field("10.00.00", 8);
    header += &field(&(256 * (1 + n_sig)).to_string(), 8);
    header += &field("", 44); // reserved
    header += &field(&seconds.to_string(), 8); // number of records
    header += &field("1", 8); // record duration, seconds
    header += &field(&n_sig.to_string(), 4);
    for label in channels {
        header += &field(label, 16);
    }
    for _ in channels {
        header += &field("", 80); // transducer
    }
    for _ in channels {
        header += &field("uV", 8);
    }
    for _ in channels {
        header += &field("-250", 8);
    }
    for _ in channels {
        header += &field("250", 8);
    }
    for _ in channels {
        header += &field("-2048", 8);
    }
    for _ in channels {
        header += &field("2047", 8);
    }
    for _ in channels {
        header += &field("", 80); // prefiltering
    }
    for _ in channels {
        header += &field(&fs.to_string(), 8);
    }
    for _ in channels {
        header += &field("", 32); // reserved
    }

    let mut bytes = header.into_bytes();
    for record in 0..seconds {
        for (ch, _) in channels.iter().enumerate() {
            for sample in 0..fs {
                let t = (record * fs + sample) as f64 / fs as f64;
                let freq = 6.0 + ch as f64;
                let value = (900.0 * (2.0 * PI * freq * t).sin()) as i16;
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
    fs::write(path, bytes).expect("write EDF fixture");
}

/// Write a BIDS events sidecar with one marker row per onset.
pub fn write_events_tsv(path: &Path, onsets: &[f64], trial_type: &str) {
    let mut contents = String::from("onset\tduration\ttrial_type\n");
    for onset in onsets {
        contents += &format!("{onset}\t0.0\t{trial_type}\n");
    }
    fs::write(path, contents).expect("write events fixture");
}

/// Lay down one recording (EDF + events) for a subject/condition/run
/// under the BIDS-flavoured dataset layout. Returns the EDF path.
pub fn write_recording(
    data_root: &Path,
    subject: &str,
    condition: &str,
    run: &str,
    channels: &[&str],
    fs: usize,
    seconds: usize,
    onsets: &[f64],
    marker: &str,
) -> PathBuf {
    let eeg_dir = data_root.join(subject).join("ses-01").join("eeg");
    fs::create_dir_all(&eeg_dir).expect("create eeg dir");
    let base = format!("{subject}_{condition}_{run}");
    let edf = eeg_dir.join(format!("{base}_eeg.edf"));
    write_edf(&edf, channels, fs, seconds);
    write_events_tsv(&eeg_dir.join(format!("{base}_events.tsv")), onsets, marker);
    edf
}

/// Analysis config shared by the extraction tests: two conditions, a
/// short epoch window, and a feasible neighbor count.
pub fn write_test_config(path: &Path) {
    let contents = "\
conditions = [\"pre\", \"post\"]
marker = \"2\"
tmin = -0.5
tmax = 0.5
baseline = [-0.5, 0.0]
fmin = 2.0
fmax = 20.0
umap_components = 8
umap_neighbors = 4
";
    fs::write(path, contents).expect("write config fixture");
}

/// Synthetic archive bypassing the raw-extraction stage.
pub fn synthetic_archive(
    conditions: &[&str],
    epochs_per_condition: usize,
    n_channels: usize,
    freqs: &[f64],
) -> PsdArchive {
    let n_epochs = conditions.len() * epochs_per_condition;
    let n_freqs = freqs.len();
    let epoch_psds = Array3::from_shape_fn((n_epochs, n_channels, n_freqs), |(e, c, f)| {
        let cluster = (e / epochs_per_condition) as f64;
        cluster * 50.0 + ((e * 13 + c * 5 + f * 3) % 17) as f64 * 0.25
    });
    let mut labels = Vec::new();
    for condition in conditions {
        labels.extend(std::iter::repeat(condition.to_string()).take(epochs_per_condition));
    }
    let run_labels = vec!["run-01".to_string(); n_epochs];
    PsdArchive::from_epochs(
        epoch_psds,
        labels,
        run_labels,
        Array1::from(freqs.to_vec()),
        (0..n_channels).map(|c| format!("EEG{c:03}")).collect(),
        conditions.iter().map(|c| c.to_string()).collect(),
    )
    .expect("synthetic archive")
}
