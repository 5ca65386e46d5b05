//! Backend-agnostic figure model plus the combined PSD figure builder.
//!
//! The library only assembles series and styles; rasterization lives in
//! the CLI so the rendering backend stays swappable.

use crate::archive::PsdArchive;
use crate::config::AnalysisConfig;
use anyhow::{anyhow, Context, Result};
use ndarray::{Array2, Axis as NdAxis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
    pub range: Option<(f64, f64)>,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    /// Parse `#RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Color)
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    /// 0.0 transparent .. 1.0 opaque
    pub alpha: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: Color,
    pub dashed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
    pub legend: Vec<LegendEntry>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis {
                label: None,
                range: None,
            },
            y: Axis {
                label: None,
                range: None,
            },
            series: Vec::new(),
            legend: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }
}

/// Build the combined PSD figure for one subject: translucent per-run
/// mean curves plus a dashed mean curve per condition, channel-averaged.
pub fn build_psd_figure(
    archive: &PsdArchive,
    cfg: &AnalysisConfig,
    subject_id: &str,
) -> Result<Figure> {
    let avg: Array2<f64> = archive
        .epoch_psds
        .mean_axis(NdAxis(1))
        .context("averaging PSD over channels")?;
    let freqs = &archive.freqs;

    let mut fig = Figure::new(Some(format!("[{subject_id}] PSD (Channel Averaged)")));
    fig.x.label = Some("Frequency (Hz)".into());
    fig.y.label = Some("PSD (Power/Hz)".into());
    let fmin = freqs.iter().cloned().fold(f64::INFINITY, f64::min);
    let fmax = freqs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if fmin.is_finite() && fmax.is_finite() {
        fig.x.range = Some((fmin, fmax));
    }

    for condition in &archive.conditions {
        let run_color = cfg
            .run_color(condition)
            .and_then(Color::from_hex)
            .ok_or_else(|| anyhow!("no run colour configured for condition {condition}"))?;
        let mean_color = cfg
            .mean_color(condition)
            .and_then(Color::from_hex)
            .ok_or_else(|| anyhow!("no mean colour configured for condition {condition}"))?;

        let cond_epochs: Vec<usize> = archive
            .labels
            .iter()
            .enumerate()
            .filter(|(_, label)| *label == condition)
            .map(|(i, _)| i)
            .collect();

        let mut runs: Vec<String> = cond_epochs
            .iter()
            .map(|&i| archive.run_labels[i].clone())
            .collect();
        runs.sort();
        runs.dedup();

        for run in &runs {
            let run_epochs: Vec<usize> = cond_epochs
                .iter()
                .copied()
                .filter(|&i| archive.run_labels[i] == *run)
                .collect();
            if run_epochs.is_empty() {
                continue;
            }
            fig.add_series(Series::Line(LineSeries {
                name: format!("{condition} {run}"),
                points: mean_curve(&avg, freqs, &run_epochs),
                style: Style {
                    width: 1.0,
                    dash: None,
                    alpha: 0.5,
                    color: run_color,
                },
            }));
        }

        fig.legend.push(LegendEntry {
            label: condition.clone(),
            color: mean_color,
            dashed: false,
        });
        if !cond_epochs.is_empty() {
            fig.add_series(Series::Line(LineSeries {
                name: format!("{condition} mean"),
                points: mean_curve(&avg, freqs, &cond_epochs),
                style: Style {
                    width: 2.0,
                    dash: Some([6.0, 4.0]),
                    alpha: 1.0,
                    color: mean_color,
                },
            }));
        }
    }

    fig.legend.push(LegendEntry {
        label: "Session Average".into(),
        color: Color(0x000000),
        dashed: true,
    });
    Ok(fig)
}

/// Per-frequency mean of the selected epoch rows.
fn mean_curve(avg: &Array2<f64>, freqs: &ndarray::Array1<f64>, epochs: &[usize]) -> Vec<[f64; 2]> {
    let n_freqs = avg.ncols();
    let mut points = Vec::with_capacity(n_freqs);
    for f in 0..n_freqs {
        let sum: f64 = epochs.iter().map(|&e| avg[[e, f]]).sum();
        points.push([freqs[f], sum / epochs.len() as f64]);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    fn line_series(fig: &Figure) -> Vec<&LineSeries> {
        fig.series
            .iter()
            .map(|series| match series {
                Series::Line(line) => line,
            })
            .collect()
    }

    fn archive_with(
        conditions: Vec<&str>,
        labels: Vec<&str>,
        run_labels: Vec<&str>,
    ) -> PsdArchive {
        let n_epochs = labels.len();
        let epoch_psds = Array3::from_shape_fn((n_epochs, 2, 3), |(e, c, f)| {
            (e + 1) as f64 * 10.0 + c as f64 + f as f64
        });
        PsdArchive::from_epochs(
            epoch_psds,
            labels.into_iter().map(String::from).collect(),
            run_labels.into_iter().map(String::from).collect(),
            Array1::from(vec![4.0, 5.0, 6.0]),
            vec!["C3".into(), "C4".into()],
            conditions.into_iter().map(String::from).collect(),
        )
        .unwrap()
    }

    #[test]
    fn one_run_line_per_run_and_one_dashed_mean_per_condition() {
        let archive = archive_with(
            vec!["pre", "post"],
            vec!["pre", "pre", "pre", "post", "post", "post"],
            vec!["run-01", "run-01", "run-02", "run-01", "run-01", "run-01"],
        );
        let cfg = AnalysisConfig::default();
        let fig = build_psd_figure(&archive, &cfg, "sub-01").unwrap();
        let lines = line_series(&fig);
        // pre: 2 runs + mean, post: 1 run + mean
        assert_eq!(lines.len(), 5);
        let dashed = lines.iter().filter(|l| l.style.dash.is_some()).count();
        assert_eq!(dashed, 2);
        // legend: one entry per condition plus the session-average style
        assert_eq!(fig.legend.len(), 3);
        assert_eq!(fig.legend[2].label, "Session Average");
        assert_eq!(fig.x.range, Some((4.0, 6.0)));
    }

    #[test]
    fn absent_condition_draws_no_curves() {
        let archive = archive_with(
            vec!["pre", "post"],
            vec!["pre", "pre"],
            vec!["run-01", "run-01"],
        );
        let cfg = AnalysisConfig::default();
        let fig = build_psd_figure(&archive, &cfg, "sub-02").unwrap();
        let lines = line_series(&fig);
        // only pre contributes: one run line and one mean line
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.name.starts_with("post")));
        // legend still lists both configured conditions
        assert_eq!(fig.legend.len(), 3);
    }

    #[test]
    fn mean_curve_averages_epochs_per_bin() {
        let archive = archive_with(vec!["pre"], vec!["pre", "pre"], vec!["run-01", "run-01"]);
        let cfg = AnalysisConfig::default();
        let fig = build_psd_figure(&archive, &cfg, "sub-03").unwrap();
        let lines = line_series(&fig);
        let mean = lines.iter().find(|l| l.name == "pre mean").unwrap();
        // channel average of epoch e at bin f is 10(e+1) + 0.5 + f
        assert!((mean.points[0][1] - 15.5).abs() < 1e-9);
        assert!((mean.points[2][1] - 17.5).abs() < 1e-9);
    }

    #[test]
    fn color_parsing() {
        let color = Color::from_hex("#6A5ACD").unwrap();
        assert_eq!(color.rgb(), (0x6A, 0x5A, 0xCD));
        assert!(Color::from_hex("6A5ACD").is_none());
        assert!(Color::from_hex("#xyzxyz").is_none());
    }

    #[test]
    fn unconfigured_condition_color_is_an_error() {
        let archive = archive_with(vec!["sham"], vec!["sham"], vec!["run-01"]);
        let cfg = AnalysisConfig::default();
        assert!(build_psd_figure(&archive, &cfg, "sub-04").is_err());
    }
}
