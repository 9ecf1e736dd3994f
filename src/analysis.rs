//! Analysis pipeline
//!
//! `VoiceAnalyzer` wires the stages together: preprocess → pitch →
//! perturbation → HNR → formants → intensity → quality → normative
//! comparison. Data flows strictly forward; the only shared intermediate
//! is the voiced/unvoiced frame map every downstream stage reads.
//!
//! Fatal input errors abort with no result. Everything after
//! preprocessing degrades instead: the affected metric groups stay
//! absent and a [`Diagnostic`] records why, so the report UI can render
//! "N/A" with the right explanation instead of a misleading zero.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::formant::{self, Formants};
use crate::intensity::{self, IntensityStatistics};
use crate::normative::{self, Gender, NormativeComparison};
use crate::perturbation::{self, Jitter, Shimmer};
use crate::pitch::{self, F0Statistics};
use crate::preprocess::preprocess;
use crate::quality::{self, QualityScores};
use crate::{hnr, CancelFlag, ConfigError, InputError, NumericalError, Sound, VoicingError};

/// Pipeline stages, in execution order. `Failed` is reachable only from
/// `Idle` and `Preprocessed`; later stages degrade the result instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Preprocessed,
    PitchTracked,
    PerturbationAnalyzed,
    FormantsExtracted,
    QualitySynthesized,
    Compared,
    Done,
    Failed,
}

/// Why a metric group is absent from the result. Distinguishes "not
/// enough data" from "computation failed" — the caller never has to
/// guess.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Too few voiced frames; F0, jitter, shimmer, HNR and quality are
    /// absent. Intensity and duration are still reported.
    InsufficientVoicing { voiced: usize, required: usize },
    /// Linear prediction failed on one frame; it was excluded from the
    /// formant aggregate.
    RootFindingFailed { frame: usize },
    /// No normative profile applies to the patient; the comparison was
    /// skipped.
    NormativeUnavailable { age: f64 },
    /// The analysis was cancelled; the result holds only the stages that
    /// completed.
    Cancelled,
}

impl From<VoicingError> for Diagnostic {
    fn from(err: VoicingError) -> Self {
        let VoicingError::InsufficientVoicing { voiced, required } = err;
        Diagnostic::InsufficientVoicing { voiced, required }
    }
}

impl From<NumericalError> for Diagnostic {
    fn from(err: NumericalError) -> Self {
        let NumericalError::RootFindingFailed { frame } = err;
        Diagnostic::RootFindingFailed { frame }
    }
}

/// The complete analysis of one sample. Constructed once, read-only for
/// the caller; absent fields are truly absent, never sentinel numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcousticAnalysisResult {
    /// Fundamental-frequency statistics over voiced frames, Hz.
    pub f0: Option<F0Statistics>,
    /// Cycle-to-cycle period perturbation.
    pub jitter: Option<Jitter>,
    /// Cycle-to-cycle amplitude perturbation.
    pub shimmer: Option<Shimmer>,
    /// Mean harmonics-to-noise ratio, dB.
    pub hnr: Option<f64>,
    /// Median formant frequencies, Hz.
    pub formants: Option<Formants>,
    /// Frame intensity statistics, dB.
    pub intensity: Option<IntensityStatistics>,
    /// Sample duration in seconds: exactly num_samples / sample_rate.
    pub duration: f64,
    /// Composite 0–100 quality scores.
    pub quality: Option<QualityScores>,
    /// Classification against the normative table.
    pub normative: Option<NormativeComparison>,
    /// Why absent fields are absent.
    pub diagnostics: Vec<Diagnostic>,
}

impl AcousticAnalysisResult {
    fn empty(duration: f64) -> Self {
        Self {
            f0: None,
            jitter: None,
            shimmer: None,
            hnr: None,
            formants: None,
            intensity: None,
            duration,
            quality: None,
            normative: None,
            diagnostics: Vec::new(),
        }
    }
}

/// The voice-analysis engine: a stateless, synchronous batch computation.
/// One `Sound` in, one [`AcousticAnalysisResult`] out. Safe to share
/// across threads; concurrent analyses of the same input are
/// bit-identical.
#[derive(Debug, Clone, Default)]
pub struct VoiceAnalyzer {
    config: AnalysisConfig,
}

impl VoiceAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one sample.
    ///
    /// # Errors
    /// Only fatal [`InputError`]s: silent signal, too-short sample. (An
    /// invalid sample rate is rejected earlier, when the `Sound` is
    /// built.) Every other problem degrades the result instead.
    pub fn analyze(
        &self,
        sound: &Sound,
        age_years: f64,
        gender: Gender,
    ) -> Result<AcousticAnalysisResult, InputError> {
        self.analyze_with_cancel(sound, age_years, gender, &CancelFlag::new())
    }

    /// Analyze a float PCM buffer per the external input contract.
    pub fn analyze_pcm_f32(
        &self,
        samples: &[f32],
        sample_rate: f64,
        age_years: f64,
        gender: Gender,
    ) -> Result<AcousticAnalysisResult, InputError> {
        let sound = Sound::from_pcm_f32(samples, sample_rate)?;
        self.analyze(&sound, age_years, gender)
    }

    /// Analyze a 16-bit PCM buffer per the external input contract.
    pub fn analyze_pcm_i16(
        &self,
        samples: &[i16],
        sample_rate: f64,
        age_years: f64,
        gender: Gender,
    ) -> Result<AcousticAnalysisResult, InputError> {
        let sound = Sound::from_pcm_i16(samples, sample_rate)?;
        self.analyze(&sound, age_years, gender)
    }

    /// Analyze with cooperative cancellation: the per-frame loops check
    /// the flag between batches and return a partial result tagged
    /// [`Diagnostic::Cancelled`] instead of running to completion.
    pub fn analyze_with_cancel(
        &self,
        sound: &Sound,
        age_years: f64,
        gender: Gender,
        cancel: &CancelFlag,
    ) -> Result<AcousticAnalysisResult, InputError> {
        let config = &self.config;
        let mut stage = Stage::Idle;
        debug!(?stage, duration = sound.duration(), "analysis started");

        let pre = match preprocess(sound, config, cancel) {
            Ok(pre) => pre,
            Err(err) => {
                stage = Stage::Failed;
                debug!(?stage, %err, "analysis aborted");
                return Err(err);
            }
        };
        stage = Stage::Preprocessed;
        debug!(?stage, frames = pre.num_frames(), voiced = pre.voiced_count(), "stage complete");

        let mut result = AcousticAnalysisResult::empty(sound.duration());
        if pre.cancelled() {
            result.diagnostics.push(Diagnostic::Cancelled);
            return Ok(result);
        }

        result.intensity = intensity::profile(&pre);
        if cancel.is_cancelled() {
            result.diagnostics.push(Diagnostic::Cancelled);
            return Ok(result);
        }

        let contour = pitch::track(&pre, config);
        stage = Stage::PitchTracked;
        debug!(?stage, voiced = contour.voiced_count(), "stage complete");

        match contour.statistics(config.min_voiced_frames) {
            Ok(stats) => {
                result.f0 = Some(stats);
                let cycles = perturbation::extract_cycles(&pre, &contour);
                result.jitter = Some(perturbation::jitter(&cycles));
                result.shimmer = Some(perturbation::shimmer(&cycles));
                result.hnr = hnr::estimate(&contour);
            }
            Err(err) => {
                result.diagnostics.push(err.into());
            }
        }
        stage = Stage::PerturbationAnalyzed;
        debug!(?stage, "stage complete");

        if cancel.is_cancelled() {
            result.diagnostics.push(Diagnostic::Cancelled);
            return Ok(result);
        }

        // Formants are not gated on the voicing minimum: they use
        // whatever voiced frames exist.
        let extraction = formant::extract(&pre, config, cancel);
        for failure in extraction.failures {
            result.diagnostics.push(failure.into());
        }
        if !extraction.formants.is_empty() {
            result.formants = Some(extraction.formants);
        }
        stage = Stage::FormantsExtracted;
        debug!(?stage, "stage complete");

        if cancel.is_cancelled() {
            result.diagnostics.push(Diagnostic::Cancelled);
            return Ok(result);
        }

        let profile = normative::NORMATIVE_VALUES.profile_for(age_years, gender);
        let normative_f0_mean = profile.as_ref().ok().map(|(_, p)| p.f0_mean);

        if let (Some(f0), Some(jitter), Some(shimmer), Some(hnr_db)) =
            (&result.f0, &result.jitter, &result.shimmer, result.hnr)
        {
            if let (Some(jitter_rel), Some(shimmer_rel)) = (jitter.relative, shimmer.relative) {
                result.quality = Some(quality::synthesize(
                    hnr_db,
                    jitter_rel,
                    shimmer_rel,
                    f0.mean,
                    normative_f0_mean,
                    config.quality_weights,
                ));
            }
        }
        stage = Stage::QualitySynthesized;
        debug!(?stage, "stage complete");

        match normative::compare(
            result.f0.map(|s| s.mean),
            result.jitter.and_then(|j| j.relative),
            result.shimmer.and_then(|s| s.relative),
            result.hnr,
            age_years,
            gender,
        ) {
            Ok(comparison) => {
                result.normative = Some(comparison);
                stage = Stage::Compared;
            }
            Err(ConfigError::UnknownProfile { age }) => {
                result.diagnostics.push(Diagnostic::NormativeUnavailable { age });
            }
        }
        debug!(?stage, "stage complete");

        stage = Stage::Done;
        info!(
            ?stage,
            duration = result.duration,
            f0_mean = result.f0.map(|s| s.mean),
            hnr = result.hnr,
            overall = result.quality.map(|q| q.overall),
            diagnostics = result.diagnostics.len(),
            "analysis complete"
        );
        Ok(result)
    }
}
