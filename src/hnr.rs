//! Harmonics-to-noise estimator
//!
//! The normalized autocorrelation at the detected pitch lag is the
//! fraction of frame energy that is periodic: r = periodic / total. The
//! per-frame HNR in dB is therefore
//!
//!   10·log10(periodic / (total − periodic)) = 10·log10(r / (1 − r))
//!
//! Frames where the aperiodic remainder is non-positive (r ≥ 1, a
//! perfectly periodic frame up to rounding) are excluded from the mean
//! rather than treated as division errors.

use tracing::debug;

use crate::pitch::PitchContour;

/// Mean HNR in dB across voiced frames, or None when no voiced frame
/// yields a usable ratio.
pub fn estimate(contour: &PitchContour) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;

    for frame in 0..contour.num_frames() {
        let Some(r) = contour.strength(frame) else {
            continue;
        };
        if r <= 0.0 || r >= 1.0 {
            continue;
        }
        sum += 10.0 * (r / (1.0 - r)).log10();
        count += 1;
    }

    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    debug!(frames = count, hnr_db = mean, "hnr estimation complete");
    Some(mean)
}
