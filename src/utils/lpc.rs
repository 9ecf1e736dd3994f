//! Linear-prediction utilities for formant analysis
//!
//! The Levinson–Durbin recursion turns a frame autocorrelation into the
//! coefficients of an all-pole vocal-tract model; the model's resonances
//! are the complex roots of the prediction polynomial. Roots are found
//! with the companion-matrix eigenvalue method.

use nalgebra::DMatrix;
use num_complex::Complex;
use std::f64::consts::PI;

/// Result of LPC analysis.
#[derive(Debug, Clone)]
pub struct LpcResult {
    /// Coefficients a[1..=m] of A(z) = 1 + a1·z⁻¹ + … + am·z⁻ᵐ.
    pub coefficients: Vec<f64>,
    /// Residual prediction error after the final recursion step.
    pub error: f64,
}

/// Compute LPC coefficients with the Levinson–Durbin recursion.
///
/// `autocorr` must hold the frame autocorrelation for lags `0..=order`.
///
/// Returns `None` when the frame carries no energy or the recursion turns
/// numerically singular (reflection coefficient on or outside the unit
/// circle, or a non-positive prediction error). Callers treat that as a
/// per-frame failure, not a fatal condition.
pub fn levinson_durbin(autocorr: &[f64], order: usize) -> Option<LpcResult> {
    if order == 0 || autocorr.len() <= order || autocorr[0] <= 0.0 {
        return None;
    }

    let mut a = vec![0.0; order + 1];
    a[0] = 1.0;
    let mut error = autocorr[0];

    for i in 1..=order {
        let mut acc = autocorr[i];
        for j in 1..i {
            acc += a[j] * autocorr[i - j];
        }
        let k = -acc / error;
        if !k.is_finite() || k.abs() >= 1.0 {
            return None;
        }

        let prev = a.clone();
        for j in 1..i {
            a[j] = prev[j] + k * prev[i - j];
        }
        a[i] = k;

        error *= 1.0 - k * k;
        if error <= 0.0 || !error.is_finite() {
            return None;
        }
    }

    Some(LpcResult {
        coefficients: a[1..].to_vec(),
        error,
    })
}

/// A vocal-tract resonance: frequency and bandwidth in Hz.
#[derive(Debug, Clone, Copy)]
pub struct Resonance {
    pub frequency: f64,
    pub bandwidth: f64,
}

/// Praat uses the same margin: poles within 50 Hz of DC or Nyquist are
/// artifacts of the analysis, not resonances.
const EDGE_MARGIN_HZ: f64 = 50.0;

/// Extract resonance candidates from LPC coefficients.
///
/// The prediction polynomial A(z) = 1 + a1·z⁻¹ + … + am·z⁻ᵐ has roots
/// zₖ = exp((−π·Bₖ + i·2π·Fₖ) / sample_rate); each conjugate pair with a
/// positive imaginary part yields one candidate:
///
/// - frequency = |arg z| · nyquist / π
/// - bandwidth = −ln|z| · nyquist / π
///
/// Roots outside the unit circle are reflected inside (z → z/|z|²), which
/// keeps the frequency and flips the bandwidth sign positive. Candidates
/// are returned sorted by frequency; bandwidth plausibility filtering is
/// the caller's concern.
pub fn lpc_to_resonances(coefficients: &[f64], sample_rate: f64) -> Vec<Resonance> {
    if coefficients.is_empty() {
        return Vec::new();
    }

    let m = coefficients.len();
    let nyquist = sample_rate / 2.0;

    // Monomial form: z^m + a1·z^(m-1) + … + am. Ascending coefficient
    // order for the companion matrix: poly[i] is the coefficient of z^i.
    let mut poly = vec![0.0; m + 1];
    for (j, &aj) in coefficients.iter().enumerate() {
        poly[m - 1 - j] = aj;
    }
    poly[m] = 1.0;

    let mut roots = find_polynomial_roots(&poly);

    // Reflect unstable poles into the unit circle, preserving the sign of
    // the imaginary part.
    for root in &mut roots {
        let mag = root.norm();
        if mag > 1.0 {
            *root /= mag * mag;
        }
    }

    let mut resonances = Vec::new();
    for root in &roots {
        if root.im < 0.0 {
            continue;
        }

        let frequency = root.im.atan2(root.re).abs() * nyquist / PI;
        if frequency < EDGE_MARGIN_HZ || frequency > nyquist - EDGE_MARGIN_HZ {
            continue;
        }

        let magnitude = root.norm();
        let bandwidth = if magnitude > 0.0 {
            -magnitude.ln() * nyquist / PI
        } else {
            nyquist
        };

        resonances.push(Resonance {
            frequency,
            bandwidth,
        });
    }

    resonances.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
    resonances
}

/// Find polynomial roots via the companion-matrix eigenvalue method.
///
/// `coefficients` are in ascending order; the leading coefficient must be
/// nonzero (degenerate leading terms are stripped recursively).
fn find_polynomial_roots(coefficients: &[f64]) -> Vec<Complex<f64>> {
    let n = coefficients.len() - 1;
    if n == 0 {
        return Vec::new();
    }

    let leading = coefficients[n];
    if leading.abs() < 1e-15 {
        return find_polynomial_roots(&coefficients[..n]);
    }

    let normalized: Vec<f64> = coefficients.iter().map(|&c| c / leading).collect();

    if n == 1 {
        return vec![Complex::new(-normalized[0], 0.0)];
    }
    if n == 2 {
        let b = normalized[1];
        let c = normalized[0];
        let discriminant = b * b - 4.0 * c;
        if discriminant >= 0.0 {
            let sqrt_d = discriminant.sqrt();
            return vec![
                Complex::new((-b + sqrt_d) / 2.0, 0.0),
                Complex::new((-b - sqrt_d) / 2.0, 0.0),
            ];
        }
        let sqrt_d = (-discriminant).sqrt();
        return vec![
            Complex::new(-b / 2.0, sqrt_d / 2.0),
            Complex::new(-b / 2.0, -sqrt_d / 2.0),
        ];
    }

    // Companion matrix with the negated coefficients in the last column:
    // [ 0 0 … 0  -c0     ]
    // [ 1 0 … 0  -c1     ]
    // [ 0 1 … 0  -c2     ]
    // [ 0 0 … 1  -c(n-1) ]
    let mut companion = DMatrix::<f64>::zeros(n, n);
    for i in 1..n {
        companion[(i, i - 1)] = 1.0;
    }
    for i in 0..n {
        companion[(i, n - 1)] = -normalized[i];
    }

    companion
        .complex_eigenvalues()
        .iter()
        .map(|c| Complex::new(c.re, c.im))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polynomial_roots_quadratic() {
        // x^2 - 5x + 6 has roots 2 and 3
        let coeffs = vec![6.0, -5.0, 1.0];
        let roots = find_polynomial_roots(&coeffs);

        assert_eq!(roots.len(), 2);

        let mut real_roots: Vec<f64> = roots.iter().map(|r| r.re).collect();
        real_roots.sort_by(|a, b| a.total_cmp(b));

        assert_relative_eq!(real_roots[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(real_roots[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_polynomial_roots_complex_pair() {
        // x^2 + 1 has roots ±i
        let coeffs = vec![1.0, 0.0, 1.0];
        let roots = find_polynomial_roots(&coeffs);

        assert_eq!(roots.len(), 2);
        for root in &roots {
            assert_relative_eq!(root.re, 0.0, epsilon = 1e-10);
            assert_relative_eq!(root.im.abs(), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_levinson_durbin_ar1_process() {
        // Autocorrelation of an AR(1) process with pole at 0.5 is
        // r[k] = 0.5^k; the recursion should recover a1 = -0.5.
        let autocorr: Vec<f64> = (0..4).map(|k| 0.5_f64.powi(k)).collect();
        let result = levinson_durbin(&autocorr, 2).unwrap();

        assert_relative_eq!(result.coefficients[0], -0.5, epsilon = 1e-10);
        assert_relative_eq!(result.coefficients[1], 0.0, epsilon = 1e-10);
        assert!(result.error > 0.0);
    }

    #[test]
    fn test_levinson_durbin_rejects_empty_frame() {
        let autocorr = vec![0.0, 0.0, 0.0];
        assert!(levinson_durbin(&autocorr, 2).is_none());
    }

    #[test]
    fn test_resonance_from_known_pole() {
        // Build a 2nd-order predictor from a conjugate pole pair at
        // 1000 Hz with 80 Hz bandwidth, then recover it.
        let sample_rate = 10000.0;
        let freq = 1000.0;
        let bw = 80.0;

        let r = (-PI * bw / sample_rate).exp();
        let theta = 2.0 * PI * freq / sample_rate;

        // (1 - z·e^{iθ}r)(1 - z·e^{-iθ}r) in z⁻¹ gives
        // A(z) = 1 - 2r·cosθ·z⁻¹ + r²·z⁻²
        let a1 = -2.0 * r * theta.cos();
        let a2 = r * r;

        let resonances = lpc_to_resonances(&[a1, a2], sample_rate);
        assert_eq!(resonances.len(), 1);
        assert_relative_eq!(resonances[0].frequency, freq, epsilon = 1e-6);
        assert_relative_eq!(resonances[0].bandwidth, bw, epsilon = 1e-6);
    }
}
