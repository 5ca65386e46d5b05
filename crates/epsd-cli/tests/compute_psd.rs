mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use epsd_lib::archive::{archive_path, PsdArchive};
use std::error::Error;

const CHANNELS: [&str; 8] = [
    "EEG001", "EEG002", "EEG003", "EEG004", "EEG005", "EEG006", "EEG007", "EEG008",
];
const FS: usize = 64;
const SECONDS: usize = 13;

fn ten_onsets() -> Vec<f64> {
    (0..10).map(|i| 1.5 + i as f64).collect()
}

#[test]
fn complete_subject_yields_aligned_archive() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let data_root = dir.path().join("raw");
    let results = dir.path().join("results");
    let config = dir.path().join("analysis.toml");
    common::write_test_config(&config);

    for condition in ["pre", "post"] {
        common::write_recording(
            &data_root,
            "sub-01",
            condition,
            "run-01",
            &CHANNELS,
            FS,
            SECONDS,
            &ten_onsets(),
            "2",
        );
    }

    let mut cmd = cargo_bin_cmd!("epsd");
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "compute-psd",
        "--data-root",
        data_root.to_str().unwrap(),
        "--results-dir",
        results.to_str().unwrap(),
    ]);
    cmd.assert().success();

    let path = archive_path(&results.join("PSD_DATA"), "sub-01");
    let archive = PsdArchive::load(&path)?;
    assert_eq!(archive.n_epochs(), 20);
    assert_eq!(archive.n_channels(), 8);
    assert_eq!(archive.labels.iter().filter(|l| *l == "pre").count(), 10);
    assert_eq!(archive.labels.iter().filter(|l| *l == "post").count(), 10);
    assert!(archive.run_labels.iter().all(|r| r == "run-01"));
    assert_eq!(
        archive.data_for_dr.ncols(),
        archive.n_channels() * archive.freqs.len()
    );
    assert!(archive
        .freqs
        .iter()
        .all(|f| *f >= 2.0 && *f <= 20.0));
    assert_eq!(archive.channels[0], "EEG001");
    archive.validate()?;
    Ok(())
}

#[test]
fn subject_missing_a_condition_writes_no_archive() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let data_root = dir.path().join("raw");
    let results = dir.path().join("results");
    let config = dir.path().join("analysis.toml");
    common::write_test_config(&config);

    // only "pre" exists; "post" is configured but absent
    common::write_recording(
        &data_root,
        "sub-02",
        "pre",
        "run-01",
        &CHANNELS,
        FS,
        SECONDS,
        &ten_onsets(),
        "2",
    );

    let mut cmd = cargo_bin_cmd!("epsd");
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "compute-psd",
        "--data-root",
        data_root.to_str().unwrap(),
        "--results-dir",
        results.to_str().unwrap(),
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output)?;
    assert!(stdout.contains("Total subjects processed: 0"));
    assert!(!archive_path(&results.join("PSD_DATA"), "sub-02").exists());
    Ok(())
}

#[test]
fn corrupt_run_is_dropped_but_subject_survives() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let data_root = dir.path().join("raw");
    let results = dir.path().join("results");
    let config = dir.path().join("analysis.toml");
    common::write_test_config(&config);

    for condition in ["pre", "post"] {
        common::write_recording(
            &data_root,
            "sub-03",
            condition,
            "run-01",
            &CHANNELS,
            FS,
            SECONDS,
            &ten_onsets(),
            "2",
        );
    }
    // a second pre run that is not a readable EDF
    let broken = data_root.join("sub-03/ses-01/eeg/sub-03_pre_run-02_eeg.edf");
    std::fs::write(&broken, b"garbage")?;

    let mut cmd = cargo_bin_cmd!("epsd");
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "compute-psd",
        "--data-root",
        data_root.to_str().unwrap(),
        "--results-dir",
        results.to_str().unwrap(),
    ]);
    cmd.assert().success();

    // archive exists and only the readable runs contributed
    let archive = PsdArchive::load(&archive_path(&results.join("PSD_DATA"), "sub-03"))?;
    assert_eq!(archive.n_epochs(), 20);
    assert!(archive.run_labels.iter().all(|r| r == "run-01"));
    Ok(())
}

#[test]
fn markers_outside_the_recording_are_dropped() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let data_root = dir.path().join("raw");
    let results = dir.path().join("results");
    let config = dir.path().join("analysis.toml");
    common::write_test_config(&config);

    // 12.9 s onset cannot fit a [-0.5, 0.5] window in a 13 s recording
    let mut onsets = ten_onsets();
    onsets.push(12.9);
    for condition in ["pre", "post"] {
        common::write_recording(
            &data_root,
            "sub-04",
            condition,
            "run-01",
            &CHANNELS,
            FS,
            SECONDS,
            &onsets,
            "2",
        );
    }

    let mut cmd = cargo_bin_cmd!("epsd");
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "compute-psd",
        "--data-root",
        data_root.to_str().unwrap(),
        "--results-dir",
        results.to_str().unwrap(),
    ]);
    cmd.assert().success();

    let archive = PsdArchive::load(&archive_path(&results.join("PSD_DATA"), "sub-04"))?;
    assert_eq!(archive.n_epochs(), 20);
    Ok(())
}
