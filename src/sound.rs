//! Sound type for audio data representation
//!
//! The Sound type is the fundamental input structure: an immutable mono
//! PCM buffer with its sample rate. Callers hand the engine either `f32`
//! or `i16` PCM per the input contract; decoding containers or codecs is
//! out of scope.

use crate::InputError;

/// Audio samples with associated sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    /// Audio samples (mono, nominally in the [-1, 1] range)
    samples: Vec<f64>,
    /// Sample rate in Hz
    sample_rate: f64,
}

impl Sound {
    /// Create a Sound from raw samples.
    ///
    /// # Errors
    /// Returns [`InputError::InvalidSampleRate`] when the sample rate is
    /// not a finite positive number.
    ///
    /// # Example
    /// ```
    /// use voicelab_core::Sound;
    ///
    /// let samples = vec![0.0, 0.5, 1.0, 0.5, 0.0, -0.5, -1.0, -0.5];
    /// let sound = Sound::from_samples(&samples, 44100.0).unwrap();
    /// assert_eq!(sound.sample_rate(), 44100.0);
    /// ```
    pub fn from_samples(samples: &[f64], sample_rate: f64) -> Result<Self, InputError> {
        Self::from_samples_owned(samples.to_vec(), sample_rate)
    }

    /// Create a Sound from owned samples (avoids cloning).
    pub fn from_samples_owned(samples: Vec<f64>, sample_rate: f64) -> Result<Self, InputError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(InputError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a Sound from 32-bit float PCM.
    pub fn from_pcm_f32(samples: &[f32], sample_rate: f64) -> Result<Self, InputError> {
        Self::from_samples_owned(samples.iter().map(|&s| s as f64).collect(), sample_rate)
    }

    /// Create a Sound from 16-bit integer PCM, normalized to [-1, 1].
    pub fn from_pcm_i16(samples: &[i16], sample_rate: f64) -> Result<Self, InputError> {
        let max_value = (1_i64 << 15) as f64;
        Self::from_samples_owned(
            samples.iter().map(|&s| s as f64 / max_value).collect(),
            sample_rate,
        )
    }

    /// Get the sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Get a reference to the audio samples.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Get the number of samples.
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Get the total duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Get the sample period (time step between samples).
    pub fn dx(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Get the root-mean-square amplitude.
    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.samples.iter().map(|&s| s * s).sum();
        (sum_sq / self.samples.len() as f64).sqrt()
    }

    /// Get the peak absolute amplitude.
    pub fn peak(&self) -> f64 {
        self.samples.iter().map(|&s| s.abs()).fold(0.0, f64::max)
    }

    /// Create a pure tone (sine wave).
    ///
    /// # Arguments
    /// * `frequency` - Frequency in Hz
    /// * `duration` - Duration in seconds
    /// * `sample_rate` - Sample rate in Hz
    /// * `amplitude` - Peak amplitude (0.0 to 1.0)
    pub fn create_tone(frequency: f64, duration: f64, sample_rate: f64, amplitude: f64) -> Sound {
        let n_samples = (duration * sample_rate).round() as usize;
        let omega = 2.0 * std::f64::consts::PI * frequency / sample_rate;

        let samples: Vec<f64> = (0..n_samples)
            .map(|i| amplitude * (omega * i as f64).sin())
            .collect();

        Sound {
            samples,
            sample_rate,
        }
    }

    /// Create silence.
    pub fn create_silence(duration: f64, sample_rate: f64) -> Sound {
        let n_samples = (duration * sample_rate).round() as usize;
        Sound {
            samples: vec![0.0; n_samples],
            sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_samples() {
        let samples = vec![0.0, 0.5, 1.0, 0.5, 0.0];
        let sound = Sound::from_samples(&samples, 44100.0).unwrap();

        assert_eq!(sound.sample_rate(), 44100.0);
        assert_eq!(sound.num_samples(), 5);
        assert_relative_eq!(sound.duration(), 5.0 / 44100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_invalid_sample_rate() {
        assert!(matches!(
            Sound::from_samples(&[0.0], 0.0),
            Err(InputError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            Sound::from_samples(&[0.0], -8000.0),
            Err(InputError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            Sound::from_samples(&[0.0], f64::NAN),
            Err(InputError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn test_pcm_i16_normalization() {
        let sound = Sound::from_pcm_i16(&[i16::MAX, 0, i16::MIN], 16000.0).unwrap();

        assert_relative_eq!(sound.samples()[0], 32767.0 / 32768.0, epsilon = 1e-12);
        assert_relative_eq!(sound.samples()[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(sound.samples()[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pure_tone() {
        let freq = 440.0;
        let sample_rate = 44100.0;
        let duration = 0.01;
        let sound = Sound::create_tone(freq, duration, sample_rate, 1.0);

        assert_relative_eq!(sound.samples()[0], 0.0, epsilon = 1e-10);

        let expected_samples = (duration * sample_rate).round() as usize;
        assert_eq!(sound.num_samples(), expected_samples);
    }

    #[test]
    fn test_rms() {
        // For a sine wave, RMS should be peak / sqrt(2)
        let amplitude = 0.8;
        let sound = Sound::create_tone(440.0, 1.0, 44100.0, amplitude);

        let rms = sound.rms();
        let expected_rms = amplitude / 2.0_f64.sqrt();
        assert_relative_eq!(rms, expected_rms, epsilon = 0.01);
    }

    #[test]
    fn test_silence_has_zero_peak() {
        let sound = Sound::create_silence(0.5, 8000.0);
        assert_eq!(sound.peak(), 0.0);
        assert_eq!(sound.num_samples(), 4000);
    }
}
