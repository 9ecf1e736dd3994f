//! voicelab-core: acoustic voice-analysis engine
//!
//! Turns one recorded speech sample into clinically interpretable
//! parameters: fundamental-frequency statistics, jitter, shimmer,
//! harmonics-to-noise ratio, formants F1–F4, intensity, composite
//! quality scores, and a classification against age/gender normative
//! ranges.
//!
//! The engine is a pure, stateless batch computation: one in-memory PCM
//! buffer in, one immutable [`AcousticAnalysisResult`] out. No I/O, no
//! shared mutable state; per-frame work is data-parallel internally and
//! two runs over the same buffer are bit-identical.
//!
//! # Example
//!
//! ```
//! use voicelab_core::{Gender, Sound, VoiceAnalyzer};
//!
//! let sound = Sound::create_tone(120.0, 1.0, 44100.0, 0.4);
//! let analyzer = VoiceAnalyzer::default();
//! let result = analyzer.analyze(&sound, 35.0, Gender::Male).unwrap();
//!
//! let f0 = result.f0.unwrap();
//! assert!((f0.mean - 120.0).abs() < 1.0);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

pub mod analysis;
pub mod config;
pub mod formant;
pub mod hnr;
pub mod intensity;
pub mod normative;
pub mod perturbation;
pub mod pitch;
pub mod preprocess;
pub mod quality;
pub mod sound;
pub mod utils;
pub mod window;

pub use analysis::{AcousticAnalysisResult, Diagnostic, VoiceAnalyzer};
pub use config::AnalysisConfig;
pub use formant::Formants;
pub use intensity::IntensityStatistics;
pub use normative::{
    Classification, Gender, NormativeComparison, NormativeProfile, NormativeTable,
    NORMATIVE_VALUES,
};
pub use perturbation::{Jitter, Shimmer};
pub use pitch::{F0Statistics, PitchContour};
pub use quality::{QualityScores, QualityWeights};
pub use sound::Sound;

/// Fatal input errors: the pipeline aborts and returns no result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    /// Peak amplitude after DC removal is below the silence threshold.
    #[error("signal is silent: peak amplitude {peak:.2e} below threshold {threshold:.2e}")]
    SilentSignal { peak: f64, threshold: f64 },

    /// The sample cannot hold one analysis window plus two cycles of the
    /// lowest analyzable frequency.
    #[error("sample too short: {duration:.3} s, need at least {required:.3} s")]
    DurationTooShort { duration: f64, required: f64 },

    /// Sample rate is not a finite positive number.
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),
}

/// Degrading voicing errors: F0-derived fields become absent, the rest of
/// the result is still produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoicingError {
    #[error("insufficient voicing: {voiced} voiced frames, need {required}")]
    InsufficientVoicing { voiced: usize, required: usize },
}

/// Degrading per-frame numerical errors: the affected frame is excluded
/// from its aggregate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericalError {
    #[error("root finding failed on frame {frame}")]
    RootFindingFailed { frame: usize },
}

/// Comparator configuration errors: the comparison step is skipped, the
/// rest of the result is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no normative profile for age {age}")]
    UnknownProfile { age: f64 },
}

/// Cooperative cancellation flag shared between the caller and the
/// per-frame worker loops, which check it between frame batches.
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The running analysis finishes its current
    /// batch and returns a partial result.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_input_error_display() {
        let err = InputError::DurationTooShort {
            duration: 0.05,
            required: 0.057,
        };
        let message = err.to_string();
        assert!(message.contains("0.050"));
        assert!(message.contains("0.057"));
    }
}
