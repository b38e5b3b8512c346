//! The persisted license record.
//!
//! A record is what gets signed and written to the writable license file,
//! to every alias, and (when issued externally) to the volume license file.
//! All dates are UTC; the validity window has day granularity.

use crate::{Error, LicenseType, ProductOptionType, Result, SystemIdentifier};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A license record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// License ID issued by the vendor (`0` when not activated).
    pub license_id: u32,
    /// Installation ID issued on activation (empty when not activated).
    pub installation_id: String,
    /// Installation name chosen on activation.
    pub installation_name: String,
    /// Product this license was issued for.
    pub product_id: u32,
    /// Product version this license was issued for.
    pub product_version: String,
    /// First day the license is effective.
    pub effective_start_date: NaiveDate,
    /// Day the license stops being effective.
    pub effective_end_date: NaiveDate,
    /// License type discriminant.
    pub license_type: LicenseType,
    /// Product option discriminant; selects the validation path.
    pub product_option: ProductOptionType,
    /// When a downloadable license was validated by trigger code (`None` = never).
    pub downloadable_validated_at: Option<DateTime<Utc>>,
    /// Identifiers of the machine(s) this license is locked to.
    pub authorized_identifiers: Vec<SystemIdentifier>,
    /// When the issuer last signed this license.
    pub signature_date: DateTime<Utc>,
    /// When this record was last written locally (`None` = never).
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl LicenseRecord {
    /// Creates an unlicensed, activation-code record whose window is the single day `today`.
    #[must_use]
    pub fn unlicensed(product_id: u32, today: NaiveDate, signature_date: DateTime<Utc>) -> Self {
        Self {
            license_id: 0,
            installation_id: String::new(),
            installation_name: String::new(),
            product_id,
            product_version: String::new(),
            effective_start_date: today,
            effective_end_date: today,
            license_type: LicenseType::Unlicensed,
            product_option: ProductOptionType::ActivationCode,
            downloadable_validated_at: None,
            authorized_identifiers: Vec::new(),
            signature_date,
            last_updated: None,
        }
    }

    /// Clears the identifiers established by a prior activation.
    pub fn clear_activation_details(&mut self) {
        self.license_id = 0;
        self.installation_id.clear();
        self.installation_name.clear();
    }

    /// Whole days from `today` until the effective end date (negative once past).
    #[must_use]
    pub fn remaining_days(&self, today: NaiveDate) -> i64 {
        (self.effective_end_date - today).num_days()
    }

    /// Returns true if `today` falls inside `[effective_start_date, effective_end_date)`.
    #[must_use]
    pub fn is_effective_on(&self, today: NaiveDate) -> bool {
        self.effective_start_date <= today && today < self.effective_end_date
    }

    /// Returns true if an installation ID has been issued.
    #[must_use]
    pub fn has_installation(&self) -> bool {
        !self.installation_id.is_empty()
    }

    /// Returns true if the license was activated: it has an installation ID and is not unlicensed.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.has_installation() && self.license_type != LicenseType::Unlicensed
    }

    /// Serializes the record to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes a record from JSON bytes, rejecting inverted validity windows.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let record: Self = serde_json::from_slice(bytes)?;
        if record.effective_start_date > record.effective_end_date {
            return Err(Error::InvalidWindow {
                start: record.effective_start_date,
                end: record.effective_end_date,
            });
        }
        Ok(record)
    }
}
