//! Analysis diagnostics: timing and sizes for each stage.
//!
//! [`analyze_with_diagnostics`] runs the same stages as
//! [`analyze`](crate::analyze) but one after another, so each stage's
//! wall-clock time can be attributed. The metric suite still runs its
//! comparators in parallel internally.
//!
//! Timestamps come from a caller-supplied [`Clock`], which keeps this
//! crate free of any particular time source.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{AnalysisConfig, AnalysisError, AnalysisResult, Dimensions, ImageRole};
use crate::{decode, metrics, normalize, score, visualize};

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDiagnostics {
    /// Decoding the "before" input.
    pub decode_before: StageDiagnostics,
    /// Decoding the "after" input.
    pub decode_after: StageDiagnostics,
    /// Working-resolution cap and shape matching.
    pub normalize: StageDiagnostics,
    /// MSE, SSIM and histogram correlation.
    pub metrics: StageDiagnostics,
    /// Heatmap rendering and PNG encoding.
    pub visualize: StageDiagnostics,
    /// Badness terms and intensity classification.
    pub score: StageDiagnostics,
    /// Total wall-clock duration (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific details.
    pub metrics: StageMetrics,
}

/// Stage-specific details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    Decode {
        role: ImageRole,
        /// Size of the encoded input.
        input_bytes: usize,
        /// Decoded shape.
        dimensions: Dimensions,
    },
    Normalize {
        target: Dimensions,
        before_resampled: bool,
        after_resampled: bool,
    },
    Metrics {
        mse: f64,
        ssim: f64,
        histogram_correlation: f64,
    },
    Visualize {
        /// Encoded artifact size.
        output_bytes: usize,
        dimensions: Dimensions,
    },
    Score {
        damage_score: f64,
        intensity_level: String,
    },
}

impl AnalysisDiagnostics {
    /// Stages in execution order with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Decode (before)", &self.decode_before),
            ("Decode (after)", &self.decode_after),
            ("Normalize", &self.normalize),
            ("Metrics", &self.metrics),
            ("Visualize", &self.visualize),
            ("Score", &self.score),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Analysis Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            dimensions,
            ..
        } => format!(
            "{input_bytes} bytes -> {dimensions} ({} px)",
            dimensions.pixel_count()
        ),
        StageMetrics::Normalize {
            target,
            before_resampled,
            after_resampled,
        } => format!(
            "target={target} resampled: before={before_resampled} after={after_resampled}"
        ),
        StageMetrics::Metrics {
            mse,
            ssim,
            histogram_correlation,
        } => format!("mse={mse:.2} ssim={ssim:.4} hist={histogram_correlation:.4}"),
        StageMetrics::Visualize {
            output_bytes,
            dimensions,
        } => format!("{dimensions} png, {output_bytes} bytes"),
        StageMetrics::Score {
            damage_score,
            intensity_level,
        } => format!("score={damage_score:.4} level={intensity_level}"),
    }
}

/// Run `f` and time it.
fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

/// Analyze a pair stage by stage, collecting diagnostics.
///
/// Produces the same [`AnalysisResult`] as [`analyze`](crate::analyze).
///
/// # Errors
///
/// Returns the same errors as [`analyze`](crate::analyze).
pub fn analyze_with_diagnostics<C: Clock>(
    before_bytes: &[u8],
    after_bytes: &[u8],
    config: &AnalysisConfig,
    clock: &C,
) -> Result<(AnalysisResult, AnalysisDiagnostics), AnalysisError> {
    let total_start = clock.now();
    config.validate()?;

    let (before, before_time) =
        timed(clock, || decode::decode_raster(before_bytes, ImageRole::Before));
    let before = before?;
    let decode_before = StageDiagnostics {
        duration: before_time,
        metrics: StageMetrics::Decode {
            role: ImageRole::Before,
            input_bytes: before_bytes.len(),
            dimensions: Dimensions::of(&before),
        },
    };

    let (after, after_time) = timed(clock, || decode::decode_raster(after_bytes, ImageRole::After));
    let after = after?;
    let decode_after = StageDiagnostics {
        duration: after_time,
        metrics: StageMetrics::Decode {
            role: ImageRole::After,
            input_bytes: after_bytes.len(),
            dimensions: Dimensions::of(&after),
        },
    };

    let (normalized, normalize_time) =
        timed(clock, || normalize::normalize_pair(before, after, config));
    let (pair, normalization) = normalized?;
    let normalize = StageDiagnostics {
        duration: normalize_time,
        metrics: StageMetrics::Normalize {
            target: normalization.target,
            before_resampled: normalization.before_resampled,
            after_resampled: normalization.after_resampled,
        },
    };

    let (metric_set, metrics_time) = timed(clock, || metrics::compute_metrics(&pair, config));
    let metric_set = metric_set?;
    let metrics = StageDiagnostics {
        duration: metrics_time,
        metrics: StageMetrics::Metrics {
            mse: metric_set.mse,
            ssim: metric_set.ssim,
            histogram_correlation: metric_set.histogram_correlation,
        },
    };

    let (visualization, visualize_time) =
        timed(clock, || visualize::visualize(&pair, &config.visualization));
    let visualization = visualization?;
    let visualize = StageDiagnostics {
        duration: visualize_time,
        metrics: StageMetrics::Visualize {
            output_bytes: visualization.bytes.len(),
            dimensions: visualization.dimensions,
        },
    };

    let ((assessment, breakdown), score_time) = timed(clock, || {
        (
            score::assess(&metric_set, &config.scoring),
            score::ScoreBreakdown::from_metrics(&metric_set, &config.scoring),
        )
    });
    let score = StageDiagnostics {
        duration: score_time,
        metrics: StageMetrics::Score {
            damage_score: assessment.damage_score,
            intensity_level: assessment.intensity_level.to_string(),
        },
    };

    let result = AnalysisResult {
        metrics: metric_set,
        assessment,
        breakdown,
        visualization,
        dimensions: pair.dimensions(),
        normalization,
    };
    let diagnostics = AnalysisDiagnostics {
        decode_before,
        decode_after,
        normalize,
        metrics,
        visualize,
        score,
        total_duration: clock.elapsed(&total_start),
    };
    Ok((result, diagnostics))
}
