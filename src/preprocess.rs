//! Signal preprocessor
//!
//! Conditions the raw sample and produces the frame sequence every later
//! stage consumes: DC removal, 30 ms Hamming frames at a 10 ms hop, and a
//! voiced/unvoiced classification per frame. A frame is voiced only when
//! its strongest normalized-autocorrelation peak inside the configured lag
//! band exceeds the voicing threshold *and* its local peak amplitude
//! clears the noise floor.
//!
//! The frame autocorrelation is divided by the analysis window's own
//! autocorrelation, which undoes the taper bias that would otherwise
//! suppress long-lag peaks for low-pitched voices.

use rayon::prelude::*;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::utils::{parabolic_peak, Fft};
use crate::window::WindowShape;
use crate::{CancelFlag, InputError, Sound};

/// Frames are processed in batches of this size; the cancellation flag is
/// checked between batches.
pub(crate) const FRAME_BATCH: usize = 64;

/// A single analysis frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame index in the sequence.
    pub index: usize,
    /// First sample of the window in the conditioned signal.
    pub start: usize,
    /// Time of the frame center in seconds.
    pub time: f64,
    /// Mean-square amplitude of the unwindowed slice.
    pub energy: f64,
    /// Peak absolute amplitude of the unwindowed slice.
    pub peak_amplitude: f64,
    /// Voicing decision.
    pub voiced: bool,
    /// Provisional pitch period in seconds, from the strongest
    /// autocorrelation peak (voiced frames only).
    pub period: Option<f64>,
    /// Window-normalized autocorrelation for lags 0..=max_lag+1
    /// (empty for unvoiced frames).
    pub acf: Vec<f64>,
}

/// Output of the preprocessor: the conditioned signal plus its frames.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    signal: Vec<f64>,
    sample_rate: f64,
    frames: Vec<Frame>,
    window_len: usize,
    hop: usize,
    min_lag: usize,
    max_lag: usize,
    cancelled: bool,
}

impl Preprocessed {
    /// The DC-removed signal.
    pub fn signal(&self) -> &[f64] {
        &self.signal
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Window length in samples.
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Hop in samples.
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Shortest candidate lag in samples (from the F0 ceiling).
    pub fn min_lag(&self) -> usize {
        self.min_lag
    }

    /// Longest candidate lag in samples (from the F0 floor).
    pub fn max_lag(&self) -> usize {
        self.max_lag
    }

    /// Whether frame production stopped early on cancellation.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Indices of voiced frames, in order.
    pub fn voiced_indices(&self) -> Vec<usize> {
        self.frames
            .iter()
            .filter(|f| f.voiced)
            .map(|f| f.index)
            .collect()
    }

    pub fn voiced_count(&self) -> usize {
        self.frames.iter().filter(|f| f.voiced).count()
    }
}

/// Condition the sample and classify frames.
///
/// # Errors
/// * [`InputError::DurationTooShort`] when the sample cannot hold one
///   fully windowed frame plus two cycles of the F0 floor.
/// * [`InputError::SilentSignal`] when the peak amplitude after DC
///   removal is below the silence threshold.
pub fn preprocess(
    sound: &Sound,
    config: &AnalysisConfig,
    cancel: &CancelFlag,
) -> Result<Preprocessed, InputError> {
    let sample_rate = sound.sample_rate();
    let duration = sound.duration();
    let required = config.min_duration();
    if duration < required {
        return Err(InputError::DurationTooShort { duration, required });
    }

    // DC removal: subtract the mean once, up front. Re-running the
    // preprocessor on its own output subtracts a mean of ~0 and leaves
    // the classification unchanged.
    let n = sound.num_samples();
    let mean: f64 = sound.samples().iter().sum::<f64>() / n as f64;
    let signal: Vec<f64> = sound.samples().iter().map(|&s| s - mean).collect();

    let global_peak = signal.iter().map(|&s| s.abs()).fold(0.0, f64::max);
    if global_peak < config.silence_peak_threshold {
        return Err(InputError::SilentSignal {
            peak: global_peak,
            threshold: config.silence_peak_threshold,
        });
    }

    let window_len = (config.window_duration * sample_rate).round() as usize;
    let hop = (config.hop_duration * sample_rate).round() as usize;
    let hop = hop.max(1);

    let nyquist = sample_rate / 2.0;
    let ceiling = config.f0_ceiling.min(nyquist);
    let min_lag = ((sample_rate / ceiling).floor() as usize).max(2);
    let max_lag =
        ((sample_rate / config.f0_floor).ceil() as usize).min(window_len.saturating_sub(2));

    let window = WindowShape::Hamming.generate(window_len);

    // Autocorrelation of the window itself, for taper-bias correction.
    let mut fft = Fft::new();
    let window_acf_raw = fft.autocorrelation(&window);
    let window_acf: Vec<f64> = window_acf_raw
        .iter()
        .map(|&v| v / window_acf_raw[0])
        .collect();

    let num_frames = (n - window_len) / hop + 1;
    let energy_floor = config.voicing_energy_ratio * global_peak;

    let mut frames: Vec<Frame> = Vec::with_capacity(num_frames);
    let mut cancelled = false;

    let indices: Vec<usize> = (0..num_frames).collect();
    for batch in indices.chunks(FRAME_BATCH) {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let mut chunk: Vec<Frame> = batch
            .par_iter()
            .map_init(Fft::new, |fft, &index| {
                classify_frame(
                    &signal,
                    index,
                    index * hop,
                    window_len,
                    sample_rate,
                    &window,
                    &window_acf,
                    min_lag,
                    max_lag,
                    config.voicing_threshold,
                    energy_floor,
                    fft,
                )
            })
            .collect();
        frames.append(&mut chunk);
    }

    debug!(
        frames = frames.len(),
        voiced = frames.iter().filter(|f| f.voiced).count(),
        window_len,
        hop,
        "preprocessing complete"
    );

    Ok(Preprocessed {
        signal,
        sample_rate,
        frames,
        window_len,
        hop,
        min_lag,
        max_lag,
        cancelled,
    })
}

#[allow(clippy::too_many_arguments)]
fn classify_frame(
    signal: &[f64],
    index: usize,
    start: usize,
    window_len: usize,
    sample_rate: f64,
    window: &[f64],
    window_acf: &[f64],
    min_lag: usize,
    max_lag: usize,
    voicing_threshold: f64,
    energy_floor: f64,
    fft: &mut Fft,
) -> Frame {
    let end = (start + window_len).min(signal.len());
    let slice = &signal[start..end];
    let time = (start + window_len / 2) as f64 / sample_rate;

    let energy = slice.iter().map(|&s| s * s).sum::<f64>() / slice.len() as f64;
    let peak_amplitude = slice.iter().map(|&s| s.abs()).fold(0.0, f64::max);

    let mut frame = Frame {
        index,
        start,
        time,
        energy,
        peak_amplitude,
        voiced: false,
        period: None,
        acf: Vec::new(),
    };

    if peak_amplitude <= energy_floor {
        return frame;
    }

    let windowed: Vec<f64> = slice.iter().zip(window.iter()).map(|(&s, &w)| s * w).collect();
    let acf_raw = fft.autocorrelation(&windowed);
    if acf_raw.is_empty() || acf_raw[0] <= 0.0 {
        return frame;
    }

    // Normalize by lag 0 and by the window's own autocorrelation.
    let upper = (max_lag + 1).min(acf_raw.len() - 1).min(window_acf.len() - 1);
    if upper < 3 {
        return frame;
    }
    let mut acf = vec![0.0; upper + 1];
    acf[0] = 1.0;
    for lag in 1..=upper {
        if window_acf[lag].abs() > 1e-10 {
            acf[lag] = acf_raw[lag] / (acf_raw[0] * window_acf[lag]);
        }
    }

    // Strongest local maximum inside the candidate lag band.
    let mut best_lag = 0usize;
    let mut best_corr = 0.0f64;
    for lag in min_lag..=max_lag.min(upper - 1) {
        let r = acf[lag];
        if r > acf[lag - 1] && r >= acf[lag + 1] && r > best_corr {
            best_corr = r;
            best_lag = lag;
        }
    }

    if best_lag > 0 && best_corr > voicing_threshold {
        let (offset, _) = parabolic_peak(acf[best_lag - 1], acf[best_lag], acf[best_lag + 1]);
        let refined_lag = best_lag as f64 + offset;
        frame.voiced = true;
        frame.period = Some(refined_lag / sample_rate);
        frame.acf = acf;
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    fn run(sound: &Sound) -> Result<Preprocessed, InputError> {
        preprocess(sound, &AnalysisConfig::default(), &CancelFlag::new())
    }

    #[test]
    fn test_tone_frames_are_voiced() {
        let sound = Sound::create_tone(200.0, 1.0, 44100.0, 0.5);
        let pre = run(&sound).unwrap();

        assert!(pre.num_frames() > 50);
        let voiced = pre.voiced_count();
        assert!(
            voiced > pre.num_frames() / 2,
            "expected mostly voiced frames, got {voiced}/{}",
            pre.num_frames()
        );

        // Provisional periods should sit near 5 ms.
        for frame in pre.frames().iter().filter(|f| f.voiced) {
            let period = frame.period.unwrap();
            assert!((period - 0.005).abs() < 0.0005, "period {period}");
        }
    }

    #[test]
    fn test_silence_rejected() {
        let sound = Sound::create_silence(1.0, 44100.0);
        assert!(matches!(run(&sound), Err(InputError::SilentSignal { .. })));
    }

    #[test]
    fn test_short_sample_rejected() {
        let sound = Sound::create_tone(200.0, 0.05, 44100.0, 0.5);
        let err = run(&sound).unwrap_err();
        match err {
            InputError::DurationTooShort { duration, required } => {
                assert!(duration < required);
            }
            other => panic!("expected DurationTooShort, got {other:?}"),
        }
    }

    #[test]
    fn test_white_noise_mostly_unvoiced() {
        // Deterministic LCG noise has no periodic structure inside the
        // candidate lag band.
        let mut state: u64 = 9;
        let samples: Vec<f64> = (0..44100)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 1.0
            })
            .collect();
        let sound = Sound::from_samples(&samples, 44100.0).unwrap();
        let pre = run(&sound).unwrap();

        let voiced = pre.voiced_count();
        assert!(
            voiced < pre.num_frames() / 4,
            "noise should be mostly unvoiced, got {voiced}/{}",
            pre.num_frames()
        );
    }

    #[test]
    fn test_idempotent_classification() {
        let sound = Sound::create_tone(150.0, 0.8, 44100.0, 0.4);
        let first = run(&sound).unwrap();

        let reconditioned = Sound::from_samples(first.signal(), 44100.0).unwrap();
        let second = run(&reconditioned).unwrap();

        assert_eq!(first.num_frames(), second.num_frames());
        for (a, b) in first.frames().iter().zip(second.frames().iter()) {
            assert_eq!(a.voiced, b.voiced, "frame {} changed voicing", a.index);
        }
    }

    #[test]
    fn test_cancellation_stops_early() {
        let sound = Sound::create_tone(200.0, 2.0, 44100.0, 0.5);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let pre = preprocess(&sound, &AnalysisConfig::default(), &cancel).unwrap();
        assert!(pre.cancelled());
        assert_eq!(pre.num_frames(), 0);
    }
}
