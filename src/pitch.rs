//! Pitch tracker
//!
//! Derives a fundamental-frequency contour from the preprocessor's voiced
//! frames. Candidates are the local maxima of each frame's normalized
//! autocorrelation inside the configured lag band, refined by parabolic
//! interpolation for sub-sample lag accuracy. A Viterbi pass over each
//! voiced run then selects the path that balances candidate strength
//! against frame-to-frame continuity, which suppresses octave errors.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::preprocess::{Frame, Preprocessed};
use crate::utils::parabolic_peak;
use crate::VoicingError;

/// Candidates kept per frame.
const MAX_CANDIDATES: usize = 4;
/// Per-candidate preference for higher-frequency (shorter-lag) peaks.
const OCTAVE_COST: f64 = 0.01;
/// Transition penalty per octave of frame-to-frame jump, at a 10 ms hop.
const OCTAVE_JUMP_COST: f64 = 0.35;

/// A pitch candidate for a single frame.
#[derive(Debug, Clone, Copy)]
pub struct PitchCandidate {
    /// Frequency in Hz.
    pub frequency: f64,
    /// Normalized autocorrelation at the candidate lag.
    pub strength: f64,
}

/// Fundamental-frequency contour aligned to the frame sequence.
///
/// Unvoiced frames carry no value; a contour entry exists only where the
/// preprocessor classified the frame as voiced.
#[derive(Debug, Clone)]
pub struct PitchContour {
    values: Vec<Option<f64>>,
    strengths: Vec<Option<f64>>,
    time_step: f64,
    first_frame_time: f64,
}

/// Aggregate F0 statistics over voiced frames, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct F0Statistics {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl PitchContour {
    /// F0 of a frame, or None if unvoiced.
    pub fn value(&self, frame: usize) -> Option<f64> {
        self.values.get(frame).copied().flatten()
    }

    /// Autocorrelation strength at the selected lag, or None if unvoiced.
    pub fn strength(&self, frame: usize) -> Option<f64> {
        self.strengths.get(frame).copied().flatten()
    }

    pub fn num_frames(&self) -> usize {
        self.values.len()
    }

    pub fn voiced_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Time step between frames in seconds.
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Time of the first frame center in seconds.
    pub fn first_frame_time(&self) -> f64 {
        self.first_frame_time
    }

    /// F0 of the voiced frame nearest to the given time, searching up to
    /// `max_distance` frames away. Used by the perturbation analyzer to
    /// look up the local period while walking the waveform.
    pub fn value_near(&self, time: f64, max_distance: usize) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let position = (time - self.first_frame_time) / self.time_step;
        let center = position.round().max(0.0) as usize;
        let center = center.min(self.values.len() - 1);

        for distance in 0..=max_distance {
            if center >= distance {
                if let Some(v) = self.value(center - distance) {
                    return Some(v);
                }
            }
            if let Some(v) = self.value(center + distance) {
                return Some(v);
            }
        }
        None
    }

    /// Aggregate statistics over voiced frames.
    ///
    /// # Errors
    /// [`VoicingError::InsufficientVoicing`] when fewer than `min_voiced`
    /// frames are voiced; callers then omit every F0-derived field.
    pub fn statistics(&self, min_voiced: usize) -> Result<F0Statistics, VoicingError> {
        let voiced: Vec<f64> = self.values.iter().flatten().copied().collect();
        if voiced.len() < min_voiced {
            return Err(VoicingError::InsufficientVoicing {
                voiced: voiced.len(),
                required: min_voiced,
            });
        }

        let n = voiced.len() as f64;
        let mean = voiced.iter().sum::<f64>() / n;
        let min = voiced.iter().copied().fold(f64::INFINITY, f64::min);
        let max = voiced.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std = if voiced.len() > 1 {
            (voiced.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Ok(F0Statistics {
            mean,
            min,
            max,
            std,
        })
    }
}

/// Track the F0 contour over the preprocessed frames.
pub fn track(pre: &Preprocessed, config: &AnalysisConfig) -> PitchContour {
    let sample_rate = pre.sample_rate();
    let ceiling = config.f0_ceiling.min(sample_rate / 2.0);

    // Candidate extraction is independent per frame.
    let candidates: Vec<Vec<PitchCandidate>> = pre
        .frames()
        .par_iter()
        .map(|frame| {
            if !frame.voiced {
                return Vec::new();
            }
            frame_candidates(
                frame,
                pre.min_lag(),
                pre.max_lag(),
                sample_rate,
                config.f0_floor,
                ceiling,
                config.voicing_threshold,
            )
        })
        .collect();

    let mut values: Vec<Option<f64>> = vec![None; candidates.len()];
    let mut strengths: Vec<Option<f64>> = vec![None; candidates.len()];

    // The continuity pass is sequential by nature; it runs per voiced run
    // so chains never span an unvoiced gap.
    let time_step = pre.hop() as f64 / sample_rate;
    let jump_cost = OCTAVE_JUMP_COST * 0.01 / time_step;

    let mut run_start = None;
    for i in 0..=candidates.len() {
        let voiced_here = i < candidates.len() && !candidates[i].is_empty();
        match (run_start, voiced_here) {
            (None, true) => run_start = Some(i),
            (Some(start), false) => {
                let winners = viterbi_run(&candidates[start..i], jump_cost, ceiling);
                for (offset, winner) in winners.into_iter().enumerate() {
                    let cand = candidates[start + offset][winner];
                    values[start + offset] = Some(cand.frequency);
                    strengths[start + offset] = Some(cand.strength);
                }
                run_start = None;
            }
            _ => {}
        }
    }

    let first_frame_time = pre.frames().first().map(|f| f.time).unwrap_or(0.0);
    let contour = PitchContour {
        values,
        strengths,
        time_step,
        first_frame_time,
    };
    debug!(
        voiced = contour.voiced_count(),
        frames = contour.num_frames(),
        "pitch tracking complete"
    );
    contour
}

/// Local maxima of the frame autocorrelation, refined and ranked.
fn frame_candidates(
    frame: &Frame,
    min_lag: usize,
    max_lag: usize,
    sample_rate: f64,
    f0_floor: f64,
    f0_ceiling: f64,
    voicing_threshold: f64,
) -> Vec<PitchCandidate> {
    let acf = &frame.acf;
    let mut candidates = Vec::new();
    if acf.len() < 3 {
        return candidates;
    }

    let upper = max_lag.min(acf.len() - 2);
    for lag in min_lag.max(2)..=upper {
        let r = acf[lag];
        // Weak peaks are not worth carrying into the continuity pass.
        if r <= 0.5 * voicing_threshold {
            continue;
        }
        if r > acf[lag - 1] && r >= acf[lag + 1] {
            let (offset, value) = parabolic_peak(acf[lag - 1], r, acf[lag + 1]);
            let refined_lag = lag as f64 + offset;
            let frequency = sample_rate / refined_lag;
            if frequency < f0_floor || frequency > f0_ceiling {
                continue;
            }
            // Normalization can push the interpolated peak past 1; fold it
            // back the way Praat does.
            let strength = if value > 1.0 { 1.0 / value } else { value };
            candidates.push(PitchCandidate {
                frequency,
                strength,
            });
        }
    }

    // Refinement can push every peak out of the analyzable band; fall
    // back on the preprocessor's provisional period so a voiced frame is
    // never left without a candidate.
    if candidates.is_empty() {
        if let Some(period) = frame.period {
            let frequency = (1.0 / period).clamp(f0_floor, f0_ceiling);
            let lag = (sample_rate * period).round() as usize;
            let strength = acf.get(lag).copied().unwrap_or(voicing_threshold);
            let strength = if strength > 1.0 { 1.0 / strength } else { strength };
            candidates.push(PitchCandidate {
                frequency,
                strength,
            });
        }
    }

    candidates.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

/// Viterbi over one voiced run: maximize summed candidate scores minus
/// octave-jump transition penalties.
fn viterbi_run(run: &[Vec<PitchCandidate>], jump_cost: f64, ceiling: f64) -> Vec<usize> {
    let local = |c: &PitchCandidate| c.strength - OCTAVE_COST * (ceiling / c.frequency).log2();

    let mut delta: Vec<Vec<f64>> = Vec::with_capacity(run.len());
    let mut psi: Vec<Vec<usize>> = Vec::with_capacity(run.len());

    delta.push(run[0].iter().map(local).collect());
    psi.push(vec![0; run[0].len()]);

    for i in 1..run.len() {
        let mut row = Vec::with_capacity(run[i].len());
        let mut back = Vec::with_capacity(run[i].len());
        for cand in &run[i] {
            let mut best = f64::NEG_INFINITY;
            let mut place = 0;
            for (j, prev) in run[i - 1].iter().enumerate() {
                let transition = jump_cost * (prev.frequency / cand.frequency).log2().abs();
                let score = delta[i - 1][j] - transition;
                if score > best {
                    best = score;
                    place = j;
                }
            }
            row.push(best + local(cand));
            back.push(place);
        }
        delta.push(row);
        psi.push(back);
    }

    // Backtrack from the best final state.
    let last = delta.len() - 1;
    let mut place = 0;
    let mut best = f64::NEG_INFINITY;
    for (j, &score) in delta[last].iter().enumerate() {
        if score > best {
            best = score;
            place = j;
        }
    }

    let mut winners = vec![0; run.len()];
    winners[last] = place;
    for i in (1..run.len()).rev() {
        place = psi[i][place];
        winners[i - 1] = place;
    }
    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::preprocess::preprocess;
    use crate::{CancelFlag, Sound};

    fn contour_for(sound: &Sound) -> PitchContour {
        let config = AnalysisConfig::default();
        let pre = preprocess(sound, &config, &CancelFlag::new()).unwrap();
        track(&pre, &config)
    }

    #[test]
    fn test_pure_tone_frequency() {
        let freq = 200.0;
        let sound = Sound::create_tone(freq, 1.0, 44100.0, 0.5);
        let contour = contour_for(&sound);

        let stats = contour.statistics(10).unwrap();
        assert!(
            (stats.mean - freq).abs() < 1.0,
            "mean F0 {} should be within 1 Hz of {}",
            stats.mean,
            freq
        );
        assert!(stats.std < 1.0, "pure tone should have a flat contour");
    }

    #[test]
    fn test_low_tone_frequency() {
        let freq = 100.0;
        let sound = Sound::create_tone(freq, 1.0, 16000.0, 0.5);
        let contour = contour_for(&sound);

        let stats = contour.statistics(10).unwrap();
        assert!(
            (stats.mean - freq).abs() < 1.0,
            "mean F0 {} should be within 1 Hz of {}",
            stats.mean,
            freq
        );
    }

    #[test]
    fn test_insufficient_voicing() {
        // Barely longer than the minimum duration: too few voiced frames
        // for statistics at the default threshold of 10.
        let sound = Sound::create_tone(200.0, 0.06, 44100.0, 0.5);
        let contour = contour_for(&sound);

        match contour.statistics(10) {
            Err(VoicingError::InsufficientVoicing { voiced, required }) => {
                assert!(voiced < required);
            }
            Ok(stats) => panic!("expected insufficient voicing, got {stats:?}"),
        }
    }

    #[test]
    fn test_viterbi_suppresses_octave_drop() {
        // A single frame whose strongest candidate is an octave low
        // should be pulled back onto the continuous path.
        let steady = vec![
            PitchCandidate { frequency: 200.0, strength: 0.97 },
            PitchCandidate { frequency: 100.0, strength: 0.90 },
        ];
        let ambiguous = vec![
            PitchCandidate { frequency: 100.0, strength: 0.98 },
            PitchCandidate { frequency: 200.0, strength: 0.96 },
        ];
        let run = vec![steady.clone(), ambiguous, steady];

        let winners = viterbi_run(&run, 0.35, 600.0);
        let chosen: Vec<f64> = winners
            .iter()
            .zip(run.iter())
            .map(|(&w, frame)| frame[w].frequency)
            .collect();

        assert_eq!(chosen, vec![200.0, 200.0, 200.0]);
    }

    #[test]
    fn test_value_near_skips_unvoiced_neighbors() {
        let contour = PitchContour {
            values: vec![None, Some(150.0), None, None],
            strengths: vec![None, Some(0.9), None, None],
            time_step: 0.01,
            first_frame_time: 0.015,
        };

        assert_eq!(contour.value_near(0.035, 2), Some(150.0));
        assert_eq!(contour.value_near(0.035, 0), None);
    }
}
