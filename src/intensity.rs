//! Intensity profiler
//!
//! Per-frame RMS energy on a dB scale relative to the 20 µPa hearing
//! threshold, aggregated over all frames — voiced and unvoiced alike,
//! since loudness is meaningful regardless of voicing.

use serde::Serialize;

use crate::preprocess::Preprocessed;

/// Reference pressure for the dB conversion (2×10⁻⁵ Pa).
pub const REFERENCE_PRESSURE: f64 = 2e-5;

/// Frames below this floor are digital silence and excluded from the
/// aggregates.
const DB_FLOOR: f64 = -300.0;

/// Aggregate intensity statistics in dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntensityStatistics {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

/// Frame-level intensity statistics, or None when every frame sits at the
/// silence floor.
pub fn profile(pre: &Preprocessed) -> Option<IntensityStatistics> {
    let threshold = REFERENCE_PRESSURE * REFERENCE_PRESSURE;

    let values: Vec<f64> = pre
        .frames()
        .iter()
        .filter_map(|frame| {
            let ratio = frame.energy / threshold;
            if ratio < 1e-30 {
                None
            } else {
                let db = 10.0 * ratio.log10();
                (db > DB_FLOOR).then_some(db)
            }
        })
        .collect();

    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let std = if values.len() > 1 {
        (values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    Some(IntensityStatistics {
        mean,
        min,
        max,
        std,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::config::AnalysisConfig;
    use crate::preprocess::preprocess;
    use crate::{CancelFlag, Sound};

    fn profile_of(sound: &Sound) -> Option<IntensityStatistics> {
        let pre = preprocess(sound, &AnalysisConfig::default(), &CancelFlag::new()).unwrap();
        profile(&pre)
    }

    #[test]
    fn test_steady_tone_is_flat() {
        let sound = Sound::create_tone(440.0, 0.5, 44100.0, 0.1);
        let stats = profile_of(&sound).unwrap();

        assert!(stats.max - stats.min < 1.0, "steady tone should vary < 1 dB");
        assert!(stats.std < 0.5);
        assert!(stats.mean > 0.0, "a -20 dBFS tone sits far above 20 µPa");
    }

    #[test]
    fn test_doubling_amplitude_adds_six_db() {
        let quiet = Sound::create_tone(440.0, 0.5, 44100.0, 0.1);
        let loud = Sound::create_tone(440.0, 0.5, 44100.0, 0.2);

        let a = profile_of(&quiet).unwrap();
        let b = profile_of(&loud).unwrap();

        assert_relative_eq!(b.mean - a.mean, 6.02, epsilon = 0.2);
    }

    #[test]
    fn test_mixed_loudness_spread() {
        // First half at full amplitude, second half at one tenth:
        // ~20 dB of spread between min and max.
        let sample_rate = 44100.0;
        let n = 44100;
        let samples: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate;
                let amp = if i < n / 2 { 0.5 } else { 0.05 };
                amp * (2.0 * std::f64::consts::PI * 220.0 * t).sin()
            })
            .collect();
        let sound = Sound::from_samples_owned(samples, sample_rate).unwrap();
        let stats = profile_of(&sound).unwrap();

        assert!(stats.max - stats.min > 15.0);
        assert!(stats.std > 5.0);
    }
}
