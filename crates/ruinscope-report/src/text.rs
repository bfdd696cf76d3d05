//! Plain-text report for terminals.

use ruinscope_core::{AnalysisResult, IntensityLevel, IntensityThresholds};

/// Format a result as a human-readable report.
///
/// `thresholds` should be the ones the result was scored with; they are
/// printed as the level scale. `visualization` is where the heatmap can
/// be found (a path or URL), if it was stored anywhere.
#[must_use]
pub fn to_text(
    result: &AnalysisResult,
    thresholds: &IntensityThresholds,
    visualization: Option<&str>,
) -> String {
    let mut lines = Vec::new();
    let assessment = &result.assessment;
    let metrics = &result.metrics;
    let breakdown = &result.breakdown;
    let norm = &result.normalization;

    lines.push(format!("Damage Assessment\n{}", "=".repeat(60)));
    lines.push(format!(
        "{} (score {:.4})",
        assessment.intensity_level.display_label(),
        assessment.damage_score,
    ));
    lines.push(format!(
        "Levels: {}",
        level_scale(thresholds, assessment.intensity_level)
    ));
    lines.push(String::new());

    lines.push(format!("{:<24} {:>12} {:>10}", "Metric", "Value", "Badness"));
    lines.push("-".repeat(48));
    lines.push(format!(
        "{:<24} {:>12.2} {:>10.4}",
        "MSE", metrics.mse, breakdown.mse
    ));
    lines.push(format!(
        "{:<24} {:>12.4} {:>10.4}",
        "SSIM", metrics.ssim, breakdown.ssim
    ));
    lines.push(format!(
        "{:<24} {:>12.4} {:>10.4}",
        "Histogram correlation", metrics.histogram_correlation, breakdown.histogram
    ));
    lines.push(String::new());

    let resampled = |flag: bool| if flag { " (resampled)" } else { "" };
    lines.push(format!(
        "Compared at {}: before {}{}, after {}{}",
        result.dimensions,
        norm.before_source,
        resampled(norm.before_resampled),
        norm.after_source,
        resampled(norm.after_resampled),
    ));

    if let Some(location) = visualization {
        lines.push(format!(
            "Heatmap: {location} ({}, {} bytes)",
            result.visualization.dimensions,
            result.visualization.bytes.len(),
        ));
    }

    lines.join("\n")
}

/// `None >= 0.00, Minor >= 0.10, [Moderate >= 0.30], ...` with the
/// current level bracketed.
fn level_scale(thresholds: &IntensityThresholds, current: IntensityLevel) -> String {
    IntensityLevel::ALL
        .iter()
        .map(|&level| {
            let entry = format!("{} >= {:.2}", level.as_str(), thresholds.lower_bound(level));
            if level == current {
                format!("[{entry}]")
            } else {
                entry
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
