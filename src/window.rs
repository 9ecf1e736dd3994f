//! Window functions for short-term analysis
//!
//! The preprocessor frames the signal with a Hamming window; the formant
//! extractor uses a truncated Gaussian. Both follow the conventions of
//! classical speech analysis (windows sampled at bin centers, normalized
//! to unit peak).

use std::f64::consts::PI;

/// Window shapes available for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowShape {
    /// Rectangular window (no tapering)
    Rectangular,
    /// Hanning window (raised cosine)
    Hanning,
    /// Hamming window
    #[default]
    Hamming,
    /// Gaussian window with fixed standard deviation
    Gaussian,
}

impl WindowShape {
    /// Window amplitude at a normalized position in [-0.5, 0.5],
    /// where 0 is the window center.
    pub fn value_at(self, position: f64) -> f64 {
        if position.abs() > 0.5 {
            return 0.0;
        }

        match self {
            WindowShape::Rectangular => 1.0,
            WindowShape::Hanning => 0.5 + 0.5 * (2.0 * PI * position).cos(),
            WindowShape::Hamming => 0.54 + 0.46 * (2.0 * PI * position).cos(),
            WindowShape::Gaussian => {
                let sigma = 0.4;
                (-0.5 * (position / sigma).powi(2)).exp()
            }
        }
    }

    /// Generate a complete window of the given size, sampled at bin
    /// centers so the taper never evaluates exactly at the edges.
    pub fn generate(self, size: usize) -> Vec<f64> {
        if size == 0 {
            return Vec::new();
        }

        (0..size)
            .map(|i| {
                let position = (i as f64 + 0.5) / size as f64 - 0.5;
                self.value_at(position)
            })
            .collect()
    }
}

/// Truncated Gaussian window for formant frames.
///
/// window[i] = (exp(-48·(i - imid)² / (n + 1)²) - edge) / (1 - edge),
/// edge = exp(-12), so the taper reaches exactly zero at both ends.
pub fn gaussian_analysis_window(size: usize) -> Vec<f64> {
    if size == 0 {
        return Vec::new();
    }

    let edge = (-12.0_f64).exp();
    let imid = (size as f64 - 1.0) / 2.0;
    let denom = (size + 1) as f64;

    (0..size)
        .map(|i| {
            let diff = i as f64 - imid;
            let gaussian = (-48.0 * diff * diff / (denom * denom)).exp();
            (gaussian - edge) / (1.0 - edge)
        })
        .collect()
}
