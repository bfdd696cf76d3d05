//! Damage scoring: fold a [`MetricSet`] into one score and a level.
//!
//! Each metric is first mapped onto a `[0, 1]` badness scale:
//!
//! | metric | badness |
//! |---|---|
//! | MSE | `min(1, mse / mse_reference_max)` |
//! | SSIM | `clamp(1 - ssim, 0, 1)` |
//! | histogram correlation | `1 - max(0, correlation)` |
//!
//! The damage score is the weighted sum of the three badness values,
//! clamped to `[0, 1]`, and the intensity level is the bucket the score
//! falls into, lower bound inclusive. Scoring never fails: out-of-range
//! metrics are clamped and a NaN metric counts as maximal badness.

use serde::{Deserialize, Serialize};

use crate::metrics::mse::MAX_MSE;
use crate::types::{AnalysisError, DamageAssessment, IntensityLevel, MetricSet};

/// Tolerance on the weight sum.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Relative weight of each badness term. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadnessWeights {
    /// Weight of the MSE term.
    pub mse: f64,
    /// Weight of the SSIM term.
    pub ssim: f64,
    /// Weight of the histogram correlation term.
    pub histogram: f64,
}

impl Default for BadnessWeights {
    fn default() -> Self {
        Self {
            mse: 1.0 / 3.0,
            ssim: 1.0 / 3.0,
            histogram: 1.0 / 3.0,
        }
    }
}

/// Lower bounds (inclusive) of the four non-`None` levels.
///
/// Scores below `minor` are [`IntensityLevel::None`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityThresholds {
    /// Lowest score classified as [`IntensityLevel::Minor`].
    pub minor: f64,
    /// Lowest score classified as [`IntensityLevel::Moderate`].
    pub moderate: f64,
    /// Lowest score classified as [`IntensityLevel::Severe`].
    pub severe: f64,
    /// Lowest score classified as [`IntensityLevel::Catastrophic`].
    pub catastrophic: f64,
}

impl Default for IntensityThresholds {
    fn default() -> Self {
        Self {
            minor: 0.1,
            moderate: 0.3,
            severe: 0.5,
            catastrophic: 0.75,
        }
    }
}

impl IntensityThresholds {
    /// Bucket a damage score.
    #[must_use]
    pub fn classify(&self, score: f64) -> IntensityLevel {
        if score >= self.catastrophic {
            IntensityLevel::Catastrophic
        } else if score >= self.severe {
            IntensityLevel::Severe
        } else if score >= self.moderate {
            IntensityLevel::Moderate
        } else if score >= self.minor {
            IntensityLevel::Minor
        } else {
            IntensityLevel::None
        }
    }

    /// Smallest score that maps to `level`.
    #[must_use]
    pub const fn lower_bound(&self, level: IntensityLevel) -> f64 {
        match level {
            IntensityLevel::None => 0.0,
            IntensityLevel::Minor => self.minor,
            IntensityLevel::Moderate => self.moderate,
            IntensityLevel::Severe => self.severe,
            IntensityLevel::Catastrophic => self.catastrophic,
        }
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        let bounds = [self.minor, self.moderate, self.severe, self.catastrophic];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(AnalysisError::InvalidConfig(
                "intensity thresholds must be finite".to_string(),
            ));
        }
        let increasing = bounds.windows(2).all(|w| w[0] < w[1]);
        if !(self.minor > 0.0 && increasing && self.catastrophic <= 1.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "intensity thresholds must satisfy 0 < minor < moderate < severe < catastrophic <= 1, got {bounds:?}"
            )));
        }
        Ok(())
    }
}

/// Calibration for the damage scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// MSE that counts as maximal badness. Defaults to the full 8-bit
    /// range, `255²`.
    pub mse_reference_max: f64,
    /// Relative weight of each badness term.
    pub weights: BadnessWeights,
    /// Score boundaries between intensity levels.
    pub thresholds: IntensityThresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            mse_reference_max: MAX_MSE,
            weights: BadnessWeights::default(),
            thresholds: IntensityThresholds::default(),
        }
    }
}

impl ScoringConfig {
    /// Check the reference, weights and thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] for a non-positive MSE
    /// reference, negative or non-finite weights, weights that do not
    /// sum to 1, or thresholds that are not strictly increasing in
    /// `(0, 1]`.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.mse_reference_max.is_finite() && self.mse_reference_max > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "mse_reference_max must be positive and finite, got {}",
                self.mse_reference_max
            )));
        }

        let w = self.weights;
        let weights = [w.mse, w.ssim, w.histogram];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "badness weights must be non-negative and finite, got {weights:?}"
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AnalysisError::InvalidConfig(format!(
                "badness weights must sum to 1, got {sum}"
            )));
        }

        self.thresholds.validate()
    }
}

/// The three badness terms behind a damage score, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// `mse / mse_reference_max`, capped at 1.
    pub mse: f64,
    /// `1 - ssim`.
    pub ssim: f64,
    /// `1 - max(0, histogram_correlation)`.
    pub histogram: f64,
}

impl ScoreBreakdown {
    /// Map each metric onto the badness scale.
    #[must_use]
    pub fn from_metrics(metrics: &MetricSet, config: &ScoringConfig) -> Self {
        Self {
            mse: unit(metrics.mse / config.mse_reference_max),
            ssim: unit(1.0 - metrics.ssim),
            histogram: unit(1.0 - metrics.histogram_correlation.max(0.0)),
        }
    }

    /// Weighted sum of the terms, clamped to `[0, 1]`.
    #[must_use]
    pub fn weighted(&self, weights: &BadnessWeights) -> f64 {
        let sum = weights.histogram.mul_add(
            self.histogram,
            weights.mse.mul_add(self.mse, weights.ssim * self.ssim),
        );
        unit(sum)
    }
}

/// Clamp to `[0, 1]`, sending NaN to 1.
fn unit(value: f64) -> f64 {
    if value.is_nan() {
        1.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Score a metric set and bucket the result.
#[must_use]
pub fn assess(metrics: &MetricSet, config: &ScoringConfig) -> DamageAssessment {
    let breakdown = ScoreBreakdown::from_metrics(metrics, config);
    let damage_score = breakdown.weighted(&config.weights);
    DamageAssessment {
        damage_score,
        intensity_level: config.thresholds.classify(damage_score),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn metrics(mse: f64, ssim: f64, histogram_correlation: f64) -> MetricSet {
        MetricSet {
            mse,
            ssim,
            histogram_correlation,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn perfect_metrics_score_zero() {
        let a = assess(&metrics(0.0, 1.0, 1.0), &ScoringConfig::default());
        assert!(a.damage_score.abs() < f64::EPSILON);
        assert_eq!(a.intensity_level, IntensityLevel::None);
    }

    #[test]
    fn worst_metrics_score_one() {
        let a = assess(&metrics(MAX_MSE, -1.0, -1.0), &ScoringConfig::default());
        assert!((a.damage_score - 1.0).abs() < 1e-12);
        assert_eq!(a.intensity_level, IntensityLevel::Catastrophic);
    }

    #[test]
    fn black_white_metrics_are_catastrophic() {
        let ssim = crate::metrics::ssim::C1 / (MAX_MSE + crate::metrics::ssim::C1);
        let a = assess(&metrics(MAX_MSE, ssim, -1.0 / 31.0), &ScoringConfig::default());
        assert!(a.damage_score > 0.99);
        assert_eq!(a.intensity_level, IntensityLevel::Catastrophic);
    }

    #[test]
    fn out_of_range_metrics_are_clamped() {
        let config = ScoringConfig::default();
        let b = ScoreBreakdown::from_metrics(&metrics(1e9, 3.0, 7.0), &config);
        assert!((b.mse - 1.0).abs() < f64::EPSILON);
        assert!(b.ssim.abs() < f64::EPSILON);
        assert!(b.histogram.abs() < f64::EPSILON);

        let b = ScoreBreakdown::from_metrics(&metrics(-5.0, -4.0, -2.0), &config);
        assert!(b.mse.abs() < f64::EPSILON);
        assert!((b.ssim - 1.0).abs() < f64::EPSILON);
        assert!((b.histogram - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn nan_metrics_count_as_worst() {
        let a = assess(
            &metrics(f64::NAN, f64::NAN, f64::NAN),
            &ScoringConfig::default(),
        );
        assert!((a.damage_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn negative_correlation_is_floored_at_zero() {
        let config = ScoringConfig::default();
        let a = ScoreBreakdown::from_metrics(&metrics(0.0, 1.0, -0.5), &config);
        let b = ScoreBreakdown::from_metrics(&metrics(0.0, 1.0, 0.0), &config);
        assert!((a.histogram - b.histogram).abs() < f64::EPSILON);
    }

    #[test]
    fn custom_weights_apply() {
        let config = ScoringConfig {
            weights: BadnessWeights {
                mse: 0.0,
                ssim: 1.0,
                histogram: 0.0,
            },
            ..ScoringConfig::default()
        };
        let a = assess(&metrics(MAX_MSE, 0.6, -1.0), &config);
        assert!((a.damage_score - 0.4).abs() < 1e-12);
        assert_eq!(a.intensity_level, IntensityLevel::Moderate);
    }

    #[test]
    fn thresholds_are_lower_bound_inclusive() {
        let t = IntensityThresholds::default();
        assert_eq!(t.classify(0.0), IntensityLevel::None);
        assert_eq!(t.classify(0.099_999), IntensityLevel::None);
        assert_eq!(t.classify(0.1), IntensityLevel::Minor);
        assert_eq!(t.classify(0.3), IntensityLevel::Moderate);
        assert_eq!(t.classify(0.5), IntensityLevel::Severe);
        assert_eq!(t.classify(0.75), IntensityLevel::Catastrophic);
        assert_eq!(t.classify(1.0), IntensityLevel::Catastrophic);
    }

    #[test]
    fn thresholds_are_contiguous_and_monotonic() {
        let t = IntensityThresholds::default();
        let mut previous = IntensityLevel::None;
        for i in 0..=10_000 {
            let score = f64::from(i) / 10_000.0;
            let level = t.classify(score);
            assert!(level >= previous, "level dropped at {score}");
            assert!(score >= t.lower_bound(level));
            previous = level;
        }
        assert_eq!(previous, IntensityLevel::Catastrophic);
    }

    #[test]
    fn every_level_is_reachable_at_its_lower_bound() {
        let t = IntensityThresholds::default();
        for level in IntensityLevel::ALL {
            assert_eq!(t.classify(t.lower_bound(level)), level);
        }
    }

    #[test]
    fn invalid_weights_rejected() {
        let config = ScoringConfig {
            weights: BadnessWeights {
                mse: 0.5,
                ssim: 0.5,
                histogram: 0.5,
            },
            ..ScoringConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidConfig(_))
        ));

        let config = ScoringConfig {
            weights: BadnessWeights {
                mse: -0.5,
                ssim: 1.0,
                histogram: 0.5,
            },
            ..ScoringConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_thresholds_rejected() {
        for thresholds in [
            IntensityThresholds {
                minor: 0.0,
                ..IntensityThresholds::default()
            },
            IntensityThresholds {
                moderate: 0.05,
                ..IntensityThresholds::default()
            },
            IntensityThresholds {
                catastrophic: 1.5,
                ..IntensityThresholds::default()
            },
            IntensityThresholds {
                severe: f64::NAN,
                ..IntensityThresholds::default()
            },
        ] {
            let config = ScoringConfig {
                thresholds,
                ..ScoringConfig::default()
            };
            assert!(config.validate().is_err(), "{thresholds:?} accepted");
        }
    }

    #[test]
    fn non_positive_mse_reference_rejected() {
        let config = ScoringConfig {
            mse_reference_max: 0.0,
            ..ScoringConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
