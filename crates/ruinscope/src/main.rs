//! ruinscope: score the damage between a before and an after photograph.
//!
//! Reads two image files, runs the comparison engine, writes the
//! difference heatmap, and prints either the response JSON or a
//! human-readable report.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin ruinscope -- [OPTIONS] <BEFORE> <AFTER>
//! ```
//!
//! Log verbosity is controlled with `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod logger;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use ruinscope_core::diagnostics::{AnalysisDiagnostics, Clock, duration_ms};
use ruinscope_core::{
    AnalysisConfig, AnalysisError, AnalysisResult, ResampleFilter, SsimWindow,
    VisualizationLayout,
};
use ruinscope_report::{AnalysisResponse, ErrorResponse, VisualizationRef};

/// Compare a before and an after photograph of the same scene.
///
/// Prints a damage score, an intensity level and the three underlying
/// metrics, and writes a PNG heatmap of where the change happened.
#[derive(Parser, Debug)]
#[command(name = "ruinscope", version)]
struct Cli {
    /// Photograph taken before the event (PNG, JPEG, BMP, WebP, TIFF).
    before: PathBuf,

    /// Photograph taken after the event.
    after: PathBuf,

    /// Where to write the visualization PNG.
    ///
    /// Defaults to `<fingerprint>.png` inside `--output-dir`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for the default visualization file name.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Embed the visualization as a data URL instead of writing a file.
    #[arg(long)]
    inline: bool,

    /// Reference the written visualization as `<PREFIX><file name>`
    /// (e.g. `/api/result-image/`).
    #[arg(long, value_name = "PREFIX")]
    url_prefix: Option<String>,

    /// Print the response JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Analysis configuration as a JSON file.
    ///
    /// Missing fields take their defaults. Individual flags below
    /// override values from the file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Visualization layout [default: overlay].
    #[arg(long, value_enum)]
    layout: Option<Layout>,

    /// Heatmap opacity over the "after" image, 0.0-1.0 [default: 0.5].
    #[arg(long)]
    overlay_alpha: Option<f32>,

    /// Gaussian sigma for smoothing the difference map; 0 disables
    /// [default: 0].
    #[arg(long)]
    smoothing_sigma: Option<f32>,

    /// SSIM window: Gaussian 11x11 (sigma 1.5) or uniform 8x8
    /// [default: gaussian].
    #[arg(long, value_enum)]
    ssim_window: Option<Window>,

    /// Luminance histogram bins, 2-256 [default: 32].
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(2..=256))]
    histogram_bins: Option<usize>,

    /// Resampling filter for shape matching [default: triangle].
    #[arg(long, value_enum)]
    resample_filter: Option<Filter>,

    /// Longest-axis cap in pixels applied before comparison.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_resolution: Option<u32>,

    /// Print per-stage timings to stderr.
    #[arg(long)]
    diagnostics: bool,

    /// Number of runs for averaging timings.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,
}

/// Visualization layout selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Layout {
    /// Color ramp only.
    Heatmap,
    /// Heatmap blended over the "after" image.
    Overlay,
    /// Before, after and overlay side by side.
    SideBySide,
}

/// SSIM window selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Window {
    /// 11x11 Gaussian, sigma 1.5.
    Gaussian,
    /// 8x8 box.
    Uniform,
}

/// Resampling filter selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Exit status for undecodable or unusable input images.
const EXIT_BAD_INPUT: u8 = 2;

/// Build an [`AnalysisConfig`] from the config file (if any) and flags.
fn config_from_cli(cli: &Cli) -> Result<AnalysisConfig, String> {
    let mut config = match cli.config {
        Some(ref path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
            serde_json::from_str(&json)
                .map_err(|e| format!("Error parsing {}: {e}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    apply_overrides(cli, &mut config);
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut AnalysisConfig) {
    if let Some(layout) = cli.layout {
        config.visualization.layout = match layout {
            Layout::Heatmap => VisualizationLayout::Heatmap,
            Layout::Overlay => VisualizationLayout::Overlay,
            Layout::SideBySide => VisualizationLayout::SideBySide,
        };
    }
    if let Some(alpha) = cli.overlay_alpha {
        config.visualization.overlay_alpha = alpha;
    }
    if let Some(sigma) = cli.smoothing_sigma {
        config.visualization.smoothing_sigma = sigma;
    }
    if let Some(window) = cli.ssim_window {
        config.ssim_window = match window {
            Window::Gaussian => SsimWindow::default(),
            Window::Uniform => SsimWindow::Uniform {
                size: SsimWindow::DEFAULT_UNIFORM_SIZE,
            },
        };
    }
    if let Some(bins) = cli.histogram_bins {
        config.histogram_bins = bins;
    }
    if let Some(filter) = cli.resample_filter {
        config.resample_filter = match filter {
            Filter::Nearest => ResampleFilter::Nearest,
            Filter::Triangle => ResampleFilter::Triangle,
            Filter::CatmullRom => ResampleFilter::CatmullRom,
            Filter::Gaussian => ResampleFilter::Gaussian,
            Filter::Lanczos3 => ResampleFilter::Lanczos3,
        };
    }
    if cli.working_resolution.is_some() {
        config.working_resolution = cli.working_resolution;
    }
}

/// Default artifact path: content fingerprint in hex.
fn default_output_path(dir: &Path, fingerprint: u64, extension: &str) -> PathBuf {
    dir.join(format!("{fingerprint:016x}.{extension}"))
}

/// Write the artifact (unless inlined) and decide how the response
/// refers to it.
fn store_visualization(
    cli: &Cli,
    result: &AnalysisResult,
    fingerprint: u64,
) -> Result<VisualizationRef, String> {
    let artifact = &result.visualization;
    let path = match (&cli.output, cli.inline) {
        (Some(path), _) => path.clone(),
        (None, true) => return Ok(VisualizationRef::Inline),
        (None, false) => default_output_path(&cli.output_dir, fingerprint, artifact.extension()),
    };

    std::fs::write(&path, &artifact.bytes)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        bytes = artifact.bytes.len(),
        dimensions = %artifact.dimensions,
        "wrote visualization",
    );

    if cli.inline {
        return Ok(VisualizationRef::Inline);
    }
    Ok(VisualizationRef::Url(reference_for(
        &path,
        cli.url_prefix.as_deref(),
    )))
}

fn reference_for(path: &Path, url_prefix: Option<&str>) -> String {
    match (url_prefix, path.file_name()) {
        (Some(prefix), Some(name)) => format!("{prefix}{}", name.to_string_lossy()),
        _ => path.display().to_string(),
    }
}

fn read_input(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => {
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "read input");
            Some(bytes)
        }
        Err(e) => {
            tracing::error!("Error reading {}: {e}", path.display());
            None
        }
    }
}

/// Report an analysis failure and pick the exit status.
fn fail(err: &AnalysisError, json: bool) -> ExitCode {
    tracing::error!(kind = %err.kind(), "{err}");
    if json {
        match ErrorResponse::from(err).to_json() {
            Ok(body) => println!("{body}"),
            Err(e) => tracing::error!("Error serializing error response: {e}"),
        }
    }
    if err.kind().is_client_error() {
        ExitCode::from(EXIT_BAD_INPUT)
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    logger::init();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            tracing::error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let (before, after) = match (read_input(&cli.before), read_input(&cli.after)) {
        (Some(before), Some(after)) => (before, after),
        _ => return ExitCode::FAILURE,
    };
    tracing::debug!(?config, runs = cli.runs, "starting analysis");

    let timed = cli.diagnostics || cli.runs > 1;
    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    let mut last = None;

    for run in 0..cli.runs {
        let outcome = if timed {
            ruinscope_core::diagnostics::analyze_with_diagnostics(&before, &after, &config, &StdClock)
                .map(|(result, diagnostics)| (result, Some(diagnostics)))
        } else {
            ruinscope_core::analyze(&before, &after, &config).map(|result| (result, None))
        };

        match outcome {
            Ok((result, diagnostics)) => {
                if let Some(diagnostics) = diagnostics {
                    if cli.diagnostics {
                        if cli.runs > 1 {
                            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
                        }
                        eprintln!("{}\n", diagnostics.report());
                    }
                    all_diagnostics.push(diagnostics);
                }
                last = Some(result);
            }
            Err(e) => return fail(&e, cli.json),
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    let Some(result) = last else {
        tracing::error!("no analysis runs completed");
        return ExitCode::FAILURE;
    };

    let fingerprint = ruinscope_core::fingerprint(&before, &after);
    let reference = match store_visualization(&cli, &result, fingerprint) {
        Ok(r) => r,
        Err(msg) => {
            tracing::error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match AnalysisResponse::new(&result, &reference).to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!("Error serializing response: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        let location = match &reference {
            VisualizationRef::Inline => None,
            VisualizationRef::Url(url) => Some(url.as_str()),
        };
        println!(
            "{}",
            ruinscope_report::to_text(&result, &config.scoring.thresholds, location)
        );
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated timings across multiple runs to stderr.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[AnalysisDiagnostics]) {
    if all_diagnostics.is_empty() {
        eprintln!("Warning: no diagnostics to summarize");
        return;
    }

    eprintln!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| duration_ms(d.total_duration))
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    eprintln!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");
    eprintln!();
    eprintln!("{:<24} {:>12}", "Stage", "Mean (ms)");
    eprintln!("{}", "-".repeat(40));

    let runs = all_diagnostics.len() as f64;
    let Some(first) = all_diagnostics.first() else {
        return;
    };
    for (index, (name, _)) in first.stages().iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| duration_ms(d.stages()[index].1.duration))
            .sum();
        eprintln!("{name:<24} {:>10.3}ms", total / runs);
    }
}
