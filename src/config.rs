//! Analysis configuration
//!
//! Every tunable of the pipeline is a named field with a documented
//! default, so recalibration never means editing algorithm code.

use crate::quality::QualityWeights;

/// Default analysis window duration in seconds (30 ms).
pub const DEFAULT_WINDOW_DURATION: f64 = 0.030;
/// Default hop between frame centers in seconds (10 ms).
pub const DEFAULT_HOP_DURATION: f64 = 0.010;
/// Default lowest analyzable fundamental frequency in Hz.
pub const DEFAULT_F0_FLOOR: f64 = 75.0;
/// Default highest analyzable fundamental frequency in Hz.
pub const DEFAULT_F0_CEILING: f64 = 600.0;
/// Minimum normalized-autocorrelation peak for a frame to count as voiced.
pub const DEFAULT_VOICING_THRESHOLD: f64 = 0.3;
/// Global peak amplitude below which the whole signal is considered silent.
pub const DEFAULT_SILENCE_PEAK_THRESHOLD: f64 = 1e-4;
/// Fraction of the global peak a frame's local peak must exceed to be voiced.
pub const DEFAULT_VOICING_ENERGY_RATIO: f64 = 0.03;
/// Minimum voiced frames for F0-derived statistics to be reported.
pub const DEFAULT_MIN_VOICED_FRAMES: usize = 10;
/// Analyze every Nth voiced frame for formants.
pub const DEFAULT_FORMANT_FRAME_STRIDE: usize = 2;
/// Resonances wider than this bandwidth are rejected as implausible.
pub const DEFAULT_MAX_FORMANT_BANDWIDTH: f64 = 400.0;
/// Pre-emphasis corner frequency for formant analysis in Hz.
pub const DEFAULT_PRE_EMPHASIS_FROM: f64 = 50.0;

/// Tunable parameters of the analysis pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Analysis window duration in seconds.
    pub window_duration: f64,
    /// Hop between frame centers in seconds.
    pub hop_duration: f64,
    /// Lowest analyzable F0 in Hz; bounds the autocorrelation lag range
    /// and the minimum sample duration.
    pub f0_floor: f64,
    /// Highest analyzable F0 in Hz (clamped to Nyquist internally).
    pub f0_ceiling: f64,
    /// Minimum normalized-autocorrelation peak for voicing.
    pub voicing_threshold: f64,
    /// Global peak amplitude below which the signal is rejected as silent.
    pub silence_peak_threshold: f64,
    /// Fraction of the global peak a frame must reach to be voiced.
    pub voicing_energy_ratio: f64,
    /// Minimum voiced frames before F0-derived metrics are reported.
    pub min_voiced_frames: usize,
    /// Stride over voiced frames for formant analysis.
    pub formant_frame_stride: usize,
    /// Bandwidth ceiling for plausible formant candidates in Hz.
    pub max_formant_bandwidth: f64,
    /// Pre-emphasis corner frequency in Hz.
    pub pre_emphasis_from: f64,
    /// Weights for the composite quality score.
    pub quality_weights: QualityWeights,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_duration: DEFAULT_WINDOW_DURATION,
            hop_duration: DEFAULT_HOP_DURATION,
            f0_floor: DEFAULT_F0_FLOOR,
            f0_ceiling: DEFAULT_F0_CEILING,
            voicing_threshold: DEFAULT_VOICING_THRESHOLD,
            silence_peak_threshold: DEFAULT_SILENCE_PEAK_THRESHOLD,
            voicing_energy_ratio: DEFAULT_VOICING_ENERGY_RATIO,
            min_voiced_frames: DEFAULT_MIN_VOICED_FRAMES,
            formant_frame_stride: DEFAULT_FORMANT_FRAME_STRIDE,
            max_formant_bandwidth: DEFAULT_MAX_FORMANT_BANDWIDTH,
            pre_emphasis_from: DEFAULT_PRE_EMPHASIS_FROM,
            quality_weights: QualityWeights::default(),
        }
    }
}

impl AnalysisConfig {
    /// Minimum sample duration the preprocessor accepts: one fully
    /// windowed frame whose autocorrelation can span two full cycles of
    /// the lowest analyzable frequency.
    pub fn min_duration(&self) -> f64 {
        self.window_duration + 2.0 / self.f0_floor
    }
}
