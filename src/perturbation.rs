//! Perturbation analyzer: jitter and shimmer
//!
//! Frame-level F0 estimates average several cycles and smooth away exactly
//! the variation jitter is supposed to measure, so cycles are re-measured
//! on the waveform itself: within each voiced run the analyzer walks from
//! peak to peak, guided by the local contour period, refining every peak
//! position and amplitude by parabolic interpolation. Sub-sample accuracy
//! matters here — integer peak picking alone adds ~0.45 % spurious jitter
//! at 44.1 kHz for a 200 Hz voice.
//!
//! Jitter operates on the cycle period sequence, shimmer on the cycle peak
//! amplitudes; both break their chains at unvoiced gaps. Smoothed variants
//! (RAP/PPQ5, APQ3/APQ5) need 3 or 5 consecutive cycles; when a recording
//! cannot supply them, only the computable subset is reported.

use serde::Serialize;

use crate::pitch::PitchContour;
use crate::preprocess::Preprocessed;
use crate::utils::parabolic_peak;

/// Search band around the expected next peak, as fractions of the local
/// period. Wide enough to follow 0.5-octave glides, narrow enough not to
/// lock onto the following cycle.
const PEAK_SEARCH_LO: f64 = 0.7;
const PEAK_SEARCH_HI: f64 = 1.3;

/// How many frames away the walker may look for a voiced contour value.
const CONTOUR_LOOKUP_RANGE: usize = 2;

/// One glottal cycle: trailing peak time, length, and peak amplitude.
#[derive(Debug, Clone, Copy)]
pub struct Cycle {
    /// Time of the cycle's trailing peak in seconds.
    pub time: f64,
    /// Cycle length in seconds.
    pub period: f64,
    /// Amplitude at the trailing peak.
    pub peak: f64,
}

/// Jitter measures, per the clinical conventions: absolute in µs, the
/// rest in percent. Fields are absent when too few consecutive cycles
/// were available — a partial result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Jitter {
    /// Mean absolute difference between consecutive periods, µs.
    pub absolute: Option<f64>,
    /// Absolute jitter relative to the mean period, %.
    pub relative: Option<f64>,
    /// Relative average perturbation (3-point), %.
    pub rap: Option<f64>,
    /// Five-point period perturbation quotient, %.
    pub ppq5: Option<f64>,
}

/// Shimmer measures: absolute in dB, the rest in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Shimmer {
    /// Mean absolute dB difference between consecutive peak amplitudes.
    pub absolute: Option<f64>,
    /// Mean absolute amplitude difference relative to the mean peak, %.
    pub relative: Option<f64>,
    /// Three-point amplitude perturbation quotient, %.
    pub apq3: Option<f64>,
    /// Five-point amplitude perturbation quotient, %.
    pub apq5: Option<f64>,
}

/// Extract cycle series, one per voiced run.
pub fn extract_cycles(pre: &Preprocessed, contour: &PitchContour) -> Vec<Vec<Cycle>> {
    let signal = pre.signal();
    let sample_rate = pre.sample_rate();
    let frames = pre.frames();

    let mut runs = Vec::new();
    let mut i = 0;
    while i < frames.len() {
        if contour.value(i).is_none() {
            i += 1;
            continue;
        }
        let start = i;
        while i < frames.len() && contour.value(i).is_some() {
            i += 1;
        }
        let last = i - 1;

        let region_start = frames[start].start;
        let region_end = (frames[last].start + pre.window_len()).min(signal.len());
        let f0 = match contour.value(start) {
            Some(f0) => f0,
            None => continue,
        };

        let cycles = walk_cycles(signal, sample_rate, region_start, region_end, f0, contour);
        if !cycles.is_empty() {
            runs.push(cycles);
        }
    }
    runs
}

/// Walk one voiced region peak to peak.
fn walk_cycles(
    signal: &[f64],
    sample_rate: f64,
    region_start: usize,
    region_end: usize,
    initial_f0: f64,
    contour: &PitchContour,
) -> Vec<Cycle> {
    let mut cycles = Vec::new();

    let period_samples = sample_rate / initial_f0;
    let seed_end = (region_start + (1.5 * period_samples) as usize).min(region_end);
    let seed = match argmax(signal, region_start, seed_end) {
        Some(k) if signal[k] > 0.0 => k,
        _ => return cycles,
    };

    let (mut pos, _) = refine(signal, seed);
    let mut f0 = initial_f0;

    loop {
        f0 = contour
            .value_near(pos / sample_rate, CONTOUR_LOOKUP_RANGE)
            .unwrap_or(f0);
        let period = sample_rate / f0;

        let lo = (pos + PEAK_SEARCH_LO * period).ceil() as usize;
        let hi = ((pos + PEAK_SEARCH_HI * period).floor() as usize).min(region_end - 1);
        if lo >= hi {
            break;
        }

        let next = match argmax(signal, lo, hi + 1) {
            Some(k) if signal[k] > 0.0 => k,
            _ => break,
        };

        let (next_pos, amplitude) = refine(signal, next);
        let cycle_period = (next_pos - pos) / sample_rate;
        if cycle_period <= 0.0 {
            break;
        }

        cycles.push(Cycle {
            time: next_pos / sample_rate,
            period: cycle_period,
            peak: amplitude,
        });
        pos = next_pos;
    }

    cycles
}

fn argmax(signal: &[f64], lo: usize, hi: usize) -> Option<usize> {
    if lo >= hi || hi > signal.len() {
        return None;
    }
    let mut best = lo;
    for k in lo..hi {
        if signal[k] > signal[best] {
            best = k;
        }
    }
    Some(best)
}

/// Parabolic sub-sample refinement of a peak at integer position `k`.
fn refine(signal: &[f64], k: usize) -> (f64, f64) {
    if k == 0 || k + 1 >= signal.len() {
        return (k as f64, signal[k]);
    }
    let (offset, value) = parabolic_peak(signal[k - 1], signal[k], signal[k + 1]);
    (k as f64 + offset, value)
}

/// Jitter over all voiced runs.
pub fn jitter(runs: &[Vec<Cycle>]) -> Jitter {
    let periods: Vec<Vec<f64>> = runs
        .iter()
        .map(|run| run.iter().map(|c| c.period).collect())
        .collect();

    let all: Vec<f64> = periods.iter().flatten().copied().collect();
    if all.is_empty() {
        return Jitter::default();
    }
    let mean_period = all.iter().sum::<f64>() / all.len() as f64;
    if mean_period <= 0.0 {
        return Jitter::default();
    }

    let mean_abs_diff = mean_consecutive_abs_diff(&periods);
    let rap = mean_window_deviation(&periods, 3).map(|d| d / mean_period * 100.0);
    let ppq5 = mean_window_deviation(&periods, 5).map(|d| d / mean_period * 100.0);

    Jitter {
        absolute: mean_abs_diff.map(|d| d * 1e6),
        relative: mean_abs_diff.map(|d| d / mean_period * 100.0),
        rap,
        ppq5,
    }
}

/// Shimmer over all voiced runs.
pub fn shimmer(runs: &[Vec<Cycle>]) -> Shimmer {
    let amplitudes: Vec<Vec<f64>> = runs
        .iter()
        .map(|run| run.iter().map(|c| c.peak).collect())
        .collect();

    let all: Vec<f64> = amplitudes.iter().flatten().copied().collect();
    if all.is_empty() {
        return Shimmer::default();
    }
    let mean_amplitude = all.iter().sum::<f64>() / all.len() as f64;
    if mean_amplitude <= 0.0 {
        return Shimmer::default();
    }

    let mean_abs_diff = mean_consecutive_abs_diff(&amplitudes);

    // Absolute shimmer in dB: mean |20·log10(A(i+1)/A(i))| over pairs of
    // strictly positive amplitudes.
    let mut db_sum = 0.0;
    let mut db_count = 0usize;
    for run in &amplitudes {
        for pair in run.windows(2) {
            if pair[0] > 0.0 && pair[1] > 0.0 {
                db_sum += (20.0 * (pair[1] / pair[0]).log10()).abs();
                db_count += 1;
            }
        }
    }

    let apq3 = mean_window_deviation(&amplitudes, 3).map(|d| d / mean_amplitude * 100.0);
    let apq5 = mean_window_deviation(&amplitudes, 5).map(|d| d / mean_amplitude * 100.0);

    Shimmer {
        absolute: (db_count > 0).then(|| db_sum / db_count as f64),
        relative: mean_abs_diff.map(|d| d / mean_amplitude * 100.0),
        apq3,
        apq5,
    }
}

/// Mean |x(i+1) − x(i)| over consecutive pairs within each run.
fn mean_consecutive_abs_diff(runs: &[Vec<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for run in runs {
        for pair in run.windows(2) {
            sum += (pair[1] - pair[0]).abs();
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Mean absolute deviation of each value from the mean of its centered
/// window of `width` consecutive values within a run.
fn mean_window_deviation(runs: &[Vec<f64>], width: usize) -> Option<f64> {
    let half = width / 2;
    let mut sum = 0.0;
    let mut count = 0usize;
    for run in runs {
        if run.len() < width {
            continue;
        }
        for i in half..run.len() - half {
            let window = &run[i - half..=i + half];
            let window_mean = window.iter().sum::<f64>() / width as f64;
            sum += (run[i] - window_mean).abs();
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::pitch;
    use crate::preprocess::preprocess;
    use crate::{CancelFlag, Sound};

    fn run_of(periods: &[f64], amplitudes: &[f64]) -> Vec<Cycle> {
        periods
            .iter()
            .zip(amplitudes.iter())
            .scan(0.0, |t, (&period, &peak)| {
                *t += period;
                Some(Cycle {
                    time: *t,
                    period,
                    peak,
                })
            })
            .collect()
    }

    #[test]
    fn test_constant_cycles_zero_perturbation() {
        let runs = vec![run_of(&[0.005; 20], &[0.8; 20])];

        let j = jitter(&runs);
        assert_eq!(j.relative, Some(0.0));
        assert_eq!(j.rap, Some(0.0));
        assert_eq!(j.ppq5, Some(0.0));

        let s = shimmer(&runs);
        assert_eq!(s.relative, Some(0.0));
        assert_eq!(s.absolute, Some(0.0));
    }

    #[test]
    fn test_alternating_periods_known_jitter() {
        // Periods alternate T and T·1.01; each consecutive pair differs by
        // 1 % of T, mean period is T·1.005.
        let periods: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 0.005 } else { 0.00505 })
            .collect();
        let runs = vec![run_of(&periods, &[1.0; 20])];

        let j = jitter(&runs);
        let expected = 0.00005 / 0.005025 * 100.0;
        assert!((j.relative.unwrap() - expected).abs() < 0.01);
        assert!((j.absolute.unwrap() - 50.0).abs() < 0.5); // 50 µs
    }

    #[test]
    fn test_smoothed_variants_need_enough_cycles() {
        let runs = vec![run_of(&[0.005; 4], &[1.0; 4])];

        let j = jitter(&runs);
        assert!(j.absolute.is_some());
        assert!(j.rap.is_some());
        assert!(j.ppq5.is_none(), "4 cycles cannot support a 5-point window");

        let s = shimmer(&runs);
        assert!(s.apq3.is_some());
        assert!(s.apq5.is_none());
    }

    #[test]
    fn test_gap_breaks_chain() {
        // Two runs with different but internally constant periods: the
        // jump between them must not register as jitter.
        let runs = vec![
            run_of(&[0.005; 10], &[1.0; 10]),
            run_of(&[0.004; 10], &[1.0; 10]),
        ];

        let j = jitter(&runs);
        assert_eq!(j.relative, Some(0.0));
    }

    #[test]
    fn test_pure_tone_near_zero_jitter_and_shimmer() {
        let config = AnalysisConfig::default();
        let sound = Sound::create_tone(200.0, 1.0, 44100.0, 0.5);
        let pre = preprocess(&sound, &config, &CancelFlag::new()).unwrap();
        let contour = pitch::track(&pre, &config);

        let cycles = extract_cycles(&pre, &contour);
        assert!(!cycles.is_empty());

        let j = jitter(&cycles);
        let s = shimmer(&cycles);
        assert!(
            j.relative.unwrap() < 0.1,
            "pure tone jitter should be ~0, got {:?}",
            j.relative
        );
        assert!(
            s.relative.unwrap() < 0.1,
            "pure tone shimmer should be ~0, got {:?}",
            s.relative
        );
    }
}
