use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use epsd_lib::{
    archive::{self, PsdArchive},
    config::{self, AnalysisConfig},
    dataset,
    dr::{self, DrOutcome, DrPoint},
    extract::{self, SubjectOutcome},
    plot::{build_psd_figure, Figure, Series},
};
use plotly::common::{Marker, MarkerSymbol, Mode, Title};
use plotly::{Layout, Plot, Scatter3D};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "epsd",
    version,
    about = "Epoch-level EEG PSD analysis: extraction, plotting, dimensionality reduction"
)]
struct Cli {
    /// TOML file overriding the built-in analysis constants
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute per-epoch PSD archives for every subject
    ComputePsd {
        /// Root directory of the raw recordings
        #[arg(long)]
        data_root: PathBuf,
        /// Base directory for analysis results
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },
    /// Render the combined per-run / per-condition PSD figure per subject
    PlotPsd {
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },
    /// Reduce epoch features (UMAP then PCA) to an interactive 3D scatter
    PlotDr {
        #[arg(long)]
        results_dir: Option<PathBuf>,
        /// Intermediate dimensionality of the manifold embedding
        #[arg(long)]
        umap_dim: Option<usize>,
        /// Neighbor count of the manifold embedding
        #[arg(long)]
        umap_neighbors: Option<usize>,
        /// Frequency band to restrict features to (e.g. ALL, THETA)
        #[arg(long)]
        band: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => AnalysisConfig::from_path(path)?,
        None => AnalysisConfig::default(),
    };
    match cli.command {
        Commands::ComputePsd {
            data_root,
            results_dir,
        } => cmd_compute_psd(&cfg, &data_root, results_dir)?,
        Commands::PlotPsd { results_dir } => cmd_plot_psd(&cfg, results_dir)?,
        Commands::PlotDr {
            results_dir,
            umap_dim,
            umap_neighbors,
            band,
        } => cmd_plot_dr(&cfg, results_dir, umap_dim, umap_neighbors, band)?,
    }
    Ok(())
}

fn results_root(results_dir: Option<PathBuf>) -> PathBuf {
    results_dir.unwrap_or_else(config::default_results_dir)
}

fn cmd_compute_psd(cfg: &AnalysisConfig, data_root: &Path, results_dir: Option<PathBuf>) -> Result<()> {
    let results_root = results_root(results_dir);
    let psd_dir = config::psd_data_dir(&results_root);
    fs::create_dir_all(&psd_dir)
        .with_context(|| format!("creating {}", psd_dir.display()))?;
    println!("PSD epoch data will be stored in: {}", psd_dir.display());

    let subject_dirs = dataset::discover_subject_dirs(data_root, &cfg.subject_dirs)?;
    if cfg.subject_dirs.iter().all(|name| name.is_empty()) {
        println!(
            "{} potential subjects found in {}.",
            subject_dirs.len(),
            data_root.display()
        );
    }

    let mut processed = 0;
    for dir_name in subject_dirs {
        let subject_id = match dataset::subject_id_of(&dir_name) {
            Some(id) => id,
            None => continue,
        };
        println!("\n===== SUBJECT PROCESSING: {subject_id} =====");
        let subject_dir = data_root.join(&dir_name);
        match extract::extract_subject(cfg, &subject_dir, &subject_id) {
            Ok(SubjectOutcome::Archive(subject_archive)) => {
                let path = archive::archive_path(&psd_dir, &subject_id);
                subject_archive.save(&path)?;
                processed += 1;
                println!(
                    "  epoch PSD data stored in {}. Data shape for DR: ({}, {})",
                    path.display(),
                    subject_archive.n_epochs(),
                    subject_archive.data_for_dr.ncols()
                );
            }
            Ok(SubjectOutcome::MissingCondition(condition)) => {
                println!("  no files found for condition {condition}. Skipping subject.");
            }
            Ok(SubjectOutcome::NoEpochs) => {
                println!("  no epochs gathered for {subject_id}. Skipping subject.");
            }
            Err(err) => {
                println!("  error processing {subject_id}: {err:#}");
            }
        }
    }

    println!("\n==========================================");
    println!("Processing complete. Total subjects processed: {processed}");
    Ok(())
}

fn cmd_plot_psd(cfg: &AnalysisConfig, results_dir: Option<PathBuf>) -> Result<()> {
    let results_root = results_root(results_dir);
    let data_dir = config::psd_data_dir(&results_root);
    let plots_dir = config::psd_plots_dir(&results_root);
    fs::create_dir_all(&plots_dir)
        .with_context(|| format!("creating {}", plots_dir.display()))?;
    println!("PSD data will be loaded from: {}", data_dir.display());
    println!("Plots will be saved to: {}", plots_dir.display());

    let archives = archive::list_archives(&data_dir)?;
    if archives.is_empty() {
        println!(
            "no PSD archives found in {}. Run compute-psd first.",
            data_dir.display()
        );
        return Ok(());
    }

    for (subject_id, path) in archives {
        println!("\n===== PLOTTING FOR SUBJECT: {subject_id} =====");
        match plot_subject_psd(cfg, &subject_id, &path, &plots_dir) {
            Ok(out) => println!("  plot saved to {}", out.display()),
            Err(err) => println!("  error loading or plotting for {subject_id}: {err:#}"),
        }
    }

    println!("\n==========================================");
    println!("Plotting complete.");
    Ok(())
}

fn plot_subject_psd(
    cfg: &AnalysisConfig,
    subject_id: &str,
    archive_path: &Path,
    plots_dir: &Path,
) -> Result<PathBuf> {
    let subject_archive = PsdArchive::load(archive_path)?;
    let figure = build_psd_figure(&subject_archive, cfg, subject_id)?;
    let out = plots_dir.join(format!("{subject_id}_psd_combined.png"));
    render_figure(&out, &figure)?;
    Ok(out)
}

fn render_figure(path: &Path, fig: &Figure) -> Result<()> {
    let root = BitMapBackend::new(path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                for point in &line.points {
                    xs.push(point[0]);
                    ys.push(point[1]);
                }
            }
        }
    }
    ensure!(!xs.is_empty(), "figure has no data points");
    let (x_min, x_max) = fig.x.range.unwrap_or_else(|| {
        (
            xs.iter().cloned().fold(f64::INFINITY, f64::min),
            xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        )
    });
    let y_min = ys.iter().cloned().fold(f64::INFINITY, f64::min);
    let y_max = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let pad = ((y_max - y_min).abs()).max(1e-12) * 0.05;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, (y_min - pad)..(y_max + pad))?;
    chart
        .configure_mesh()
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;

    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                let color = RGBColor(r, g, b).mix(line.style.alpha as f64);
                let style = color.stroke_width(line.style.width as u32);
                let points = line.points.iter().map(|p| (p[0], p[1]));
                if let Some(dash) = line.style.dash {
                    chart.draw_series(DashedLineSeries::new(
                        points,
                        dash[0] as i32,
                        dash[1] as i32,
                        style,
                    ))?;
                } else {
                    chart.draw_series(LineSeries::new(points, style))?;
                }
            }
        }
    }

    for entry in &fig.legend {
        let (r, g, b) = entry.color.rgb();
        let color = RGBColor(r, g, b);
        chart
            .draw_series(std::iter::once(PathElement::new(
                Vec::<(f64, f64)>::new(),
                color.stroke_width(2),
            )))?
            .label(entry.label.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
            });
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.9))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

fn cmd_plot_dr(
    cfg: &AnalysisConfig,
    results_dir: Option<PathBuf>,
    umap_dim: Option<usize>,
    umap_neighbors: Option<usize>,
    band: Option<String>,
) -> Result<()> {
    let results_root = results_root(results_dir);
    let data_dir = config::psd_data_dir(&results_root);
    let plots_dir = config::dr_plots_dir(&results_root);
    fs::create_dir_all(&plots_dir)
        .with_context(|| format!("creating {}", plots_dir.display()))?;

    let umap_dim = umap_dim.unwrap_or(cfg.umap_components);
    let neighbors = umap_neighbors.unwrap_or(cfg.umap_neighbors);
    let band = band.unwrap_or_else(|| cfg.dr_band.clone());

    let archives = archive::list_archives(&data_dir)?;
    if archives.is_empty() {
        println!(
            "no PSD archives found in {}. Run compute-psd first.",
            data_dir.display()
        );
        return Ok(());
    }

    for (subject_id, path) in archives {
        println!("\n===== DR ANALYSIS FOR SUBJECT: {subject_id} =====");
        if let Err(err) =
            reduce_and_plot(cfg, &subject_id, &path, &plots_dir, &band, umap_dim, neighbors)
        {
            println!("  error during DR or plotting for {subject_id}: {err:#}");
        }
    }

    println!("\n==========================================");
    println!("Interactive dimensionality analysis complete.");
    Ok(())
}

fn reduce_and_plot(
    cfg: &AnalysisConfig,
    subject_id: &str,
    archive_path: &Path,
    plots_dir: &Path,
    band: &str,
    umap_dim: usize,
    neighbors: usize,
) -> Result<()> {
    let subject_archive = PsdArchive::load(archive_path)?;
    match dr::reduce_archive(&subject_archive, cfg, band, umap_dim, neighbors)? {
        DrOutcome::EmptyBand { band, fmin, fmax } => {
            println!(
                "  no frequencies in the selected range {band} ({fmin}-{fmax} Hz). Skipping."
            );
        }
        DrOutcome::TooFewEpochs { n_epochs, required } => {
            println!("  not enough epochs for UMAP ({n_epochs} < {required}). Skipping.");
        }
        DrOutcome::Embedded(points) => {
            let out = plots_dir.join(format!("{subject_id}_dr_umap_pca_3d_interactive.html"));
            write_dr_plot(&points, cfg, subject_id, band, umap_dim, neighbors, &out);
            println!("  interactive 3D plot saved to {}", out.display());
        }
    }
    Ok(())
}

fn marker_symbol(index: usize) -> MarkerSymbol {
    match index % 8 {
        0 => MarkerSymbol::Circle,
        1 => MarkerSymbol::Square,
        2 => MarkerSymbol::Diamond,
        3 => MarkerSymbol::Cross,
        4 => MarkerSymbol::X,
        5 => MarkerSymbol::CircleOpen,
        6 => MarkerSymbol::SquareOpen,
        _ => MarkerSymbol::DiamondOpen,
    }
}

#[allow(clippy::too_many_arguments)]
fn write_dr_plot(
    points: &[DrPoint],
    cfg: &AnalysisConfig,
    subject_id: &str,
    band: &str,
    umap_dim: usize,
    neighbors: usize,
    out: &Path,
) {
    // one trace per composite label, in first-seen epoch order
    let mut groups: Vec<(String, Vec<&DrPoint>)> = Vec::new();
    for point in points {
        match groups
            .iter_mut()
            .find(|(label, _)| *label == point.condition_run)
        {
            Some((_, members)) => members.push(point),
            None => groups.push((point.condition_run.clone(), vec![point])),
        }
    }

    let mut plot = Plot::new();
    for (index, (label, members)) in groups.iter().enumerate() {
        let xs: Vec<f64> = members.iter().map(|p| p.coords[0]).collect();
        let ys: Vec<f64> = members.iter().map(|p| p.coords[1]).collect();
        let zs: Vec<f64> = members.iter().map(|p| p.coords[2]).collect();
        let hover: Vec<String> = members
            .iter()
            .map(|p| format!("Condition: {}<br>Run: {}", p.condition, p.run))
            .collect();
        let color = cfg
            .run_color(&members[0].condition)
            .unwrap_or("#888888")
            .to_string();
        let trace = Scatter3D::new(xs, ys, zs)
            .mode(Mode::Markers)
            .name(label)
            .hover_text_array(hover)
            .marker(
                Marker::new()
                    .size(4)
                    .symbol(marker_symbol(index))
                    .color(color)
                    .opacity(0.7),
            );
        plot.add_trace(trace);
    }

    let title = format!(
        "[{subject_id}] PSD DR: UMAP -> PCA (Band: {band})<br>UMAP:<br>Number of neighbors = {neighbors}<br>Number of components = {umap_dim}"
    );
    plot.set_layout(Layout::new().title(Title::with_text(title)).height(700));
    plot.write_html(out);
}
