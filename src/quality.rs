//! Quality synthesizer
//!
//! Deterministic, explainable 0–100 scores derived from the measured
//! acoustics — no trained model. Every scale factor is a named constant
//! so clinical recalibration never touches the formulas.

use serde::Serialize;

/// HNR at or below this value maps to maximal breathiness.
pub const HNR_FLOOR_DB: f64 = 0.0;
/// Breathiness points per dB of HNR above the floor.
pub const BREATHINESS_SCALE: f64 = 4.0;
/// Roughness points per percent of relative jitter. The 1.04 % clinical
/// jitter boundary lands at ~26 points.
pub const ROUGHNESS_SCALE: f64 = 25.0;
/// Strain points per percent of relative shimmer.
pub const STRAIN_SHIMMER_SCALE: f64 = 8.0;
/// Strain points per Hz of mean F0 above the normative mean.
pub const STRAIN_F0_EXCESS_SCALE: f64 = 0.5;

/// Weights of the three sub-scores in the overall score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityWeights {
    pub breathiness: f64,
    pub roughness: f64,
    pub strain: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            breathiness: 1.0,
            roughness: 1.0,
            strain: 1.0,
        }
    }
}

/// Composite voice-quality scores, each clamped to 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityScores {
    /// 100 = unremarkable voice, 0 = severely degraded.
    pub overall: f64,
    pub breathiness: f64,
    pub roughness: f64,
    pub strain: f64,
}

/// Combine the measured acoustics into quality scores.
///
/// `normative_f0_mean` contributes the pitch-excess term of strain; when
/// no normative profile applies, the term is dropped rather than guessed.
pub fn synthesize(
    hnr_db: f64,
    jitter_relative: f64,
    shimmer_relative: f64,
    f0_mean: f64,
    normative_f0_mean: Option<f64>,
    weights: QualityWeights,
) -> QualityScores {
    let breathiness = clamp_score(100.0 - (hnr_db - HNR_FLOOR_DB) * BREATHINESS_SCALE);
    let roughness = clamp_score(jitter_relative * ROUGHNESS_SCALE);

    let f0_excess = normative_f0_mean
        .map(|norm| (f0_mean - norm).max(0.0))
        .unwrap_or(0.0);
    let strain = clamp_score(
        shimmer_relative * STRAIN_SHIMMER_SCALE + f0_excess * STRAIN_F0_EXCESS_SCALE,
    );

    let weight_sum = weights.breathiness + weights.roughness + weights.strain;
    let weighted = if weight_sum > 0.0 {
        (breathiness * weights.breathiness
            + roughness * weights.roughness
            + strain * weights.strain)
            / weight_sum
    } else {
        (breathiness + roughness + strain) / 3.0
    };
    let overall = clamp_score(100.0 - weighted);

    QualityScores {
        overall,
        breathiness,
        roughness,
        strain,
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
