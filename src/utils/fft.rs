//! FFT wrapper for autocorrelation analysis
//!
//! Thin convenience layer over rustfft used by the preprocessor (frame
//! autocorrelation for voicing and pitch candidates) and the formant
//! extractor (frame autocorrelation for linear prediction).

use num_complex::Complex;
use rustfft::FftPlanner;

/// FFT processor with cached plans.
///
/// Plans are cached per size by the planner, so repeated calls with the
/// same frame length reuse the same twiddle tables. Not shareable across
/// threads; parallel frame loops create one per worker.
pub struct Fft {
    planner: FftPlanner<f64>,
}

impl Fft {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Forward FFT of real-valued input, zero-padded to `output_size`.
    pub fn real_fft(&mut self, input: &[f64], output_size: usize) -> Vec<Complex<f64>> {
        let fft_size = output_size.max(input.len());
        let fft = self.planner.plan_fft_forward(fft_size);

        let mut buffer: Vec<Complex<f64>> = input
            .iter()
            .map(|&x| Complex::new(x, 0.0))
            .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
            .take(fft_size)
            .collect();

        fft.process(&mut buffer);
        buffer
    }

    /// Inverse FFT, normalized by 1/N.
    pub fn inverse_fft(&mut self, input: &[Complex<f64>]) -> Vec<Complex<f64>> {
        let fft_size = input.len();
        let fft = self.planner.plan_fft_inverse(fft_size);

        let mut buffer = input.to_vec();
        fft.process(&mut buffer);

        let scale = 1.0 / fft_size as f64;
        for c in &mut buffer {
            *c *= scale;
        }

        buffer
    }

    /// Linear (non-circular) autocorrelation via the power spectrum.
    ///
    /// The input is zero-padded to at least 2n so the circular wrap-around
    /// does not alias into the lags of interest. Returns lags 0..n-1.
    pub fn autocorrelation(&mut self, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        if n == 0 {
            return Vec::new();
        }

        let fft_size = (2 * n).next_power_of_two();
        let spectrum = self.real_fft(input, fft_size);

        let power: Vec<Complex<f64>> = spectrum
            .iter()
            .map(|c| Complex::new(c.norm_sqr(), 0.0))
            .collect();

        let autocorr = self.inverse_fft(&power);
        autocorr[..n].iter().map(|c| c.re).collect()
    }
}

impl Default for Fft {
    fn default() -> Self {
        Self::new()
    }
}
