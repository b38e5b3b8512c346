//! License discriminants.
//!
//! `ProductOptionType` decides which validation path a record takes;
//! `LicenseType` decides which checks apply on the standard path and is the
//! target of trigger-code transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of license a record grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
    /// Evaluation (not activated).
    Unlicensed,
    /// Activated for a limited period.
    TimeLimited,
    /// Activated without an expiration date.
    FullNonExpiring,
}

impl LicenseType {
    /// Returns true if the effective date window must be enforced.
    #[must_use]
    pub fn is_time_bound(&self) -> bool {
        matches!(self, Self::Unlicensed | Self::TimeLimited)
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unlicensed => "unlicensed",
            Self::TimeLimited => "time-limited",
            Self::FullNonExpiring => "full",
        };
        f.write_str(s)
    }
}

/// How the license was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductOptionType {
    /// Issued or upgraded locally through trigger codes.
    ActivationCode,
    /// Issued externally as a volume license file; not machine-locked.
    VolumeLicense,
    /// Issued externally, effective only after a trigger-code validation.
    DownloadableLicenseWithTriggerCodeValidation,
}

impl ProductOptionType {
    /// Returns true for the externally authoritative kinds (volume or downloadable).
    #[must_use]
    pub fn is_volume_kind(&self) -> bool {
        matches!(
            self,
            Self::VolumeLicense | Self::DownloadableLicenseWithTriggerCodeValidation
        )
    }
}

impl fmt::Display for ProductOptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ActivationCode => "activation-code",
            Self::VolumeLicense => "volume",
            Self::DownloadableLicenseWithTriggerCodeValidation => "downloadable",
        };
        f.write_str(s)
    }
}
