//! Normative comparator
//!
//! A process-wide, read-only reference table of expected values per
//! age/gender group, and the classification of measured metrics against
//! it. Boundary values are Normal (inclusive ranges). The comparator does
//! table lookup and comparison only — no computation, no mutation.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Patient gender, as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// The normative group a patient resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileGroup {
    Child,
    AdultMale,
    AdultFemale,
}

/// Reference ranges for one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormativeProfile {
    /// Expected mean-F0 range in Hz, inclusive.
    pub f0_range: (f64, f64),
    /// Typical mean F0 in Hz.
    pub f0_mean: f64,
    /// Upper bound for relative jitter, %.
    pub jitter_max: f64,
    /// Upper bound for relative shimmer, %.
    pub shimmer_max: f64,
    /// Lower bound for HNR, dB.
    pub hnr_min: f64,
}

/// The full reference table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormativeTable {
    pub child: NormativeProfile,
    pub adult_male: NormativeProfile,
    pub adult_female: NormativeProfile,
}

/// Process-wide normative values. Jitter/shimmer/HNR bounds are the
/// standard clinical thresholds (jitter 1.04 %, shimmer 3.81 %, HNR
/// 20 dB); F0 ranges are the conventional speaking ranges per group.
pub static NORMATIVE_VALUES: NormativeTable = NormativeTable {
    child: NormativeProfile {
        f0_range: (200.0, 300.0),
        f0_mean: 250.0,
        jitter_max: 1.04,
        shimmer_max: 3.81,
        hnr_min: 20.0,
    },
    adult_male: NormativeProfile {
        f0_range: (85.0, 180.0),
        f0_mean: 120.0,
        jitter_max: 1.04,
        shimmer_max: 3.81,
        hnr_min: 20.0,
    },
    adult_female: NormativeProfile {
        f0_range: (165.0, 255.0),
        f0_mean: 210.0,
        jitter_max: 1.04,
        shimmer_max: 3.81,
        hnr_min: 20.0,
    },
};

/// Adults are 18 and over; younger patients use the child profile
/// regardless of gender.
const ADULT_AGE_YEARS: f64 = 18.0;

impl NormativeTable {
    /// Resolve the profile for a patient.
    ///
    /// # Errors
    /// [`ConfigError::UnknownProfile`] for a non-finite or negative age.
    pub fn profile_for(
        &self,
        age_years: f64,
        gender: Gender,
    ) -> Result<(ProfileGroup, &NormativeProfile), ConfigError> {
        if !age_years.is_finite() || age_years < 0.0 {
            return Err(ConfigError::UnknownProfile { age: age_years });
        }
        if age_years < ADULT_AGE_YEARS {
            return Ok((ProfileGroup::Child, &self.child));
        }
        Ok(match gender {
            Gender::Male => (ProfileGroup::AdultMale, &self.adult_male),
            Gender::Female => (ProfileGroup::AdultFemale, &self.adult_female),
        })
    }
}

/// Classification of one metric against its normative bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    Normal,
    Altered,
}

/// Per-metric classification for the resolved group. A metric that was
/// not measured carries no classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormativeComparison {
    pub group: ProfileGroup,
    pub f0_mean: Option<Classification>,
    pub jitter: Option<Classification>,
    pub shimmer: Option<Classification>,
    pub hnr: Option<Classification>,
}

/// Classify the measured metrics against the table.
pub fn compare(
    f0_mean: Option<f64>,
    jitter_relative: Option<f64>,
    shimmer_relative: Option<f64>,
    hnr_db: Option<f64>,
    age_years: f64,
    gender: Gender,
) -> Result<NormativeComparison, ConfigError> {
    let (group, profile) = NORMATIVE_VALUES.profile_for(age_years, gender)?;

    let within = |v: f64, (lo, hi): (f64, f64)| {
        if v >= lo && v <= hi {
            Classification::Normal
        } else {
            Classification::Altered
        }
    };
    let at_most = |v: f64, max: f64| {
        if v <= max {
            Classification::Normal
        } else {
            Classification::Altered
        }
    };
    let at_least = |v: f64, min: f64| {
        if v >= min {
            Classification::Normal
        } else {
            Classification::Altered
        }
    };

    Ok(NormativeComparison {
        group,
        f0_mean: f0_mean.map(|v| within(v, profile.f0_range)),
        jitter: jitter_relative.map(|v| at_most(v, profile.jitter_max)),
        shimmer: shimmer_relative.map(|v| at_most(v, profile.shimmer_max)),
        hnr: hnr_db.map(|v| at_least(v, profile.hnr_min)),
    })
}
