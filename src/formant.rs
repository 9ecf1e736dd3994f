//! Formant extractor
//!
//! Vocal-tract resonances via linear prediction: pre-emphasize, window a
//! subset of voiced frames with a Gaussian taper, run the Levinson–Durbin
//! recursion on the frame autocorrelation (order ≈ sample_rate/1000 + 2),
//! and read F1–F4 off the roots of the prediction polynomial. Narrow
//! bandwidth is the plausibility test: wide poles model spectral slope,
//! not resonances.
//!
//! Aggregation across frames uses the median, which shrugs off the
//! occasional frame where root finding goes astray; such frames are
//! excluded and reported, never fatal.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::preprocess::{Preprocessed, FRAME_BATCH};
use crate::utils::{levinson_durbin, lpc_to_resonances, Fft, Resonance};
use crate::window::gaussian_analysis_window;
use crate::{CancelFlag, NumericalError};

/// How many formants the engine reports.
const NUM_FORMANTS: usize = 4;

/// Median formant frequencies in Hz. A slot is absent when no analyzed
/// frame produced that resonance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Formants {
    pub f1: Option<f64>,
    pub f2: Option<f64>,
    pub f3: Option<f64>,
    pub f4: Option<f64>,
}

impl Formants {
    pub fn is_empty(&self) -> bool {
        self.f1.is_none() && self.f2.is_none() && self.f3.is_none() && self.f4.is_none()
    }
}

/// Extraction output: the aggregate plus the per-frame failures that
/// were excluded from it.
#[derive(Debug, Clone, Default)]
pub struct FormantExtraction {
    pub formants: Formants,
    pub failures: Vec<NumericalError>,
}

/// Extract F1–F4 from every `formant_frame_stride`-th voiced frame.
pub fn extract(
    pre: &Preprocessed,
    config: &AnalysisConfig,
    cancel: &CancelFlag,
) -> FormantExtraction {
    let sample_rate = pre.sample_rate();
    let window_len = pre.window_len();

    let emphasized = pre_emphasize(pre.signal(), sample_rate, config.pre_emphasis_from);
    let window = gaussian_analysis_window(window_len);
    let order = (sample_rate / 1000.0).round() as usize + 2;

    let stride = config.formant_frame_stride.max(1);
    let selected: Vec<usize> = pre
        .voiced_indices()
        .into_iter()
        .step_by(stride)
        .collect();

    // One entry per analyzed frame: the per-frame formant candidates, or
    // the failure that excluded the frame.
    let mut per_frame: Vec<Result<Vec<Resonance>, NumericalError>> =
        Vec::with_capacity(selected.len());
    for batch in selected.chunks(FRAME_BATCH) {
        if cancel.is_cancelled() {
            break;
        }
        let mut chunk: Vec<Result<Vec<Resonance>, NumericalError>> = batch
            .par_iter()
            .map_init(Fft::new, |fft, &index| {
                let start = pre.frames()[index].start;
                frame_resonances(
                    &emphasized,
                    start,
                    window_len,
                    &window,
                    order,
                    sample_rate,
                    config.max_formant_bandwidth,
                    fft,
                )
                .ok_or(NumericalError::RootFindingFailed { frame: index })
            })
            .collect();
        per_frame.append(&mut chunk);
    }

    // Median per slot across the frames that produced that resonance.
    let mut slots: [Vec<f64>; NUM_FORMANTS] = Default::default();
    let mut failures = Vec::new();
    for outcome in &per_frame {
        match outcome {
            Ok(resonances) => {
                for (slot, resonance) in resonances.iter().take(NUM_FORMANTS).enumerate() {
                    slots[slot].push(resonance.frequency);
                }
            }
            Err(failure) => failures.push(failure.clone()),
        }
    }

    let formants = Formants {
        f1: median(&mut slots[0]),
        f2: median(&mut slots[1]),
        f3: median(&mut slots[2]),
        f4: median(&mut slots[3]),
    };

    debug!(
        analyzed = per_frame.len(),
        failed = failures.len(),
        order,
        "formant extraction complete"
    );

    FormantExtraction { formants, failures }
}

/// First-order pre-emphasis: y[n] = x[n] − α·x[n−1],
/// α = exp(−2π·from_frequency / sample_rate).
fn pre_emphasize(signal: &[f64], sample_rate: f64, from_frequency: f64) -> Vec<f64> {
    if signal.is_empty() || from_frequency <= 0.0 {
        return signal.to_vec();
    }
    let alpha = (-2.0 * std::f64::consts::PI * from_frequency / sample_rate).exp();

    let mut filtered = Vec::with_capacity(signal.len());
    filtered.push(signal[0]);
    for i in 1..signal.len() {
        filtered.push(signal[i] - alpha * signal[i - 1]);
    }
    filtered
}

/// Plausible resonances of one frame, sorted by frequency, at most four.
/// None when the recursion fails on this frame.
#[allow(clippy::too_many_arguments)]
fn frame_resonances(
    emphasized: &[f64],
    start: usize,
    window_len: usize,
    window: &[f64],
    order: usize,
    sample_rate: f64,
    max_bandwidth: f64,
    fft: &mut Fft,
) -> Option<Vec<Resonance>> {
    let end = (start + window_len).min(emphasized.len());
    let windowed: Vec<f64> = emphasized[start..end]
        .iter()
        .zip(window.iter())
        .map(|(&s, &w)| s * w)
        .collect();

    let acf = fft.autocorrelation(&windowed);
    let lpc = levinson_durbin(&acf, order)?;

    let resonances: Vec<Resonance> = lpc_to_resonances(&lpc.coefficients, sample_rate)
        .into_iter()
        .filter(|r| r.bandwidth > 0.0 && r.bandwidth < max_bandwidth)
        .take(NUM_FORMANTS)
        .collect();

    Some(resonances)
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some(0.5 * (values[mid - 1] + values[mid]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::preprocess::preprocess;
    use crate::{CancelFlag, Sound};

    /// Second-order resonator: y[n] = x[n] + 2r·cosθ·y[n−1] − r²·y[n−2].
    fn resonate(input: &[f64], freq: f64, bandwidth: f64, sample_rate: f64) -> Vec<f64> {
        let r = (-std::f64::consts::PI * bandwidth / sample_rate).exp();
        let theta = 2.0 * std::f64::consts::PI * freq / sample_rate;
        let c1 = 2.0 * r * theta.cos();
        let c2 = -r * r;

        let mut out = vec![0.0; input.len()];
        for i in 0..input.len() {
            let y1 = if i >= 1 { out[i - 1] } else { 0.0 };
            let y2 = if i >= 2 { out[i - 2] } else { 0.0 };
            out[i] = input[i] + c1 * y1 + c2 * y2;
        }
        out
    }

    /// Glottal-like source: impulse train at the given rate.
    fn impulse_train(f0: f64, duration: f64, sample_rate: f64) -> Vec<f64> {
        let n = (duration * sample_rate) as usize;
        let period = sample_rate / f0;
        let mut out = vec![0.0; n];
        let mut next = 0.0;
        for (i, sample) in out.iter_mut().enumerate() {
            if i as f64 >= next {
                *sample = 1.0;
                next += period;
            }
        }
        out
    }

    #[test]
    fn test_synthetic_vowel_formants() {
        let sample_rate = 10000.0;
        let source = impulse_train(120.0, 1.0, sample_rate);
        let vowel = resonate(
            &resonate(&source, 700.0, 60.0, sample_rate),
            1200.0,
            80.0,
            sample_rate,
        );
        // Keep amplitudes in a sane range.
        let peak = vowel.iter().map(|&s| s.abs()).fold(0.0, f64::max);
        let scaled: Vec<f64> = vowel.iter().map(|&s| 0.5 * s / peak).collect();

        let config = AnalysisConfig::default();
        let sound = Sound::from_samples_owned(scaled, sample_rate).unwrap();
        let pre = preprocess(&sound, &config, &CancelFlag::new()).unwrap();

        let extraction = extract(&pre, &config, &CancelFlag::new());
        let f1 = extraction.formants.f1.expect("F1 should be found");
        let f2 = extraction.formants.f2.expect("F2 should be found");

        assert!((f1 - 700.0).abs() < 80.0, "F1 {f1} should be near 700 Hz");
        assert!((f2 - 1200.0).abs() < 120.0, "F2 {f2} should be near 1200 Hz");
    }

    #[test]
    fn test_median_aggregation() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0]), Some(3.0));
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_cancelled_extraction_is_empty() {
        let config = AnalysisConfig::default();
        let sound = Sound::create_tone(150.0, 0.5, 16000.0, 0.5);
        let pre = preprocess(&sound, &config, &CancelFlag::new()).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let extraction = extract(&pre, &config, &cancel);
        assert!(extraction.formants.is_empty());
        assert!(extraction.failures.is_empty());
    }
}
