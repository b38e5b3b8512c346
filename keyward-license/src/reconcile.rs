//! Start-up reconciliation.
//!
//! Decides which license on disk is authoritative, brings the writable
//! license file in line with it and finishes with the validation pipeline.
//!
//! Without a volume license file the writable file is used as-is (or a
//! fresh evaluation is started). With one, the volume file wins whenever the
//! writable copy is missing or of a different kind, and otherwise may
//! replace it under the configured overwrite policy.

use crate::error::LicenseResult;
use crate::license::WritableLicense;
use crate::volume::VolumeLicense;
use keyward_types::LicenseRecord;
use tracing::debug;

impl WritableLicense {
    /// Loads, reconciles and validates the license.
    pub fn initialize(&mut self) -> LicenseResult<()> {
        let result = self.initialize_inner();
        self.track(result)
    }

    /// Reconciles the writable license with the volume license file, then validates.
    pub fn initialize_volume(&mut self) -> LicenseResult<()> {
        let result = self.initialize_volume_inner();
        self.track(result)
    }

    fn initialize_inner(&mut self) -> LicenseResult<()> {
        if self.config.volume_license_file_path.exists() {
            return self.initialize_volume_inner();
        }

        let path = self.config.license_file_path.clone();
        if let Err(e) = self.load_file_inner(&path) {
            debug!(error = %e, "no usable license file, starting evaluation");
            self.create_evaluation_inner(self.config.fresh_evaluation_days, true, false)?;
            self.load_file_inner(&path)?;
        }
        self.validate_inner()
    }

    fn initialize_volume_inner(&mut self) -> LicenseResult<()> {
        let volume = VolumeLicense::load(
            &self.config.volume_license_file_path,
            self.codec.as_ref(),
        )?;
        let candidate = volume.into_record();

        let path = self.config.license_file_path.clone();
        let overwrite = match self.load_file_inner(&path) {
            Err(e) => {
                debug!(error = %e, "no usable writable license");
                true
            }
            Ok(()) => {
                let option = self.record.product_option;
                !option.is_volume_kind() || option != candidate.product_option
            }
        };

        if overwrite {
            debug!(
                option = %candidate.product_option,
                "volume license replaces the writable license"
            );
            self.adopt(candidate);
            self.save_license_file_inner()?;
        } else if self.config.overwrite.is_enabled() {
            self.apply_overwrite_policy()?;
        }

        self.validate_inner()
    }

    /// Replaces a valid writable copy with a newer or older volume file, as the policy allows.
    fn apply_overwrite_policy(&mut self) -> LicenseResult<()> {
        let candidate: LicenseRecord = match VolumeLicense::load(
            &self.config.volume_license_file_path,
            self.codec.as_ref(),
        ) {
            Ok(volume) => volume.into_record(),
            Err(e) => {
                debug!(error = %e, "volume license did not reload, keeping writable license");
                return Ok(());
            }
        };
        if let Err(e) = self.validate_inner() {
            debug!(error = %e, "writable license invalid, overwrite policy not applied");
            return Ok(());
        }

        let policy = self.config.overwrite;
        let is_newer = policy.newer_allowed && candidate.signature_date > self.record.signature_date;
        let is_older = policy.older_allowed && candidate.signature_date < self.record.signature_date;
        if !(is_newer || is_older) {
            return Ok(());
        }

        let requires_activation = (is_newer && policy.newer_requires_activation)
            || (is_older && policy.older_requires_activation);
        let validated_at = self.record.downloadable_validated_at;
        let authorized = std::mem::take(&mut self.record.authorized_identifiers);

        debug!(
            newer = is_newer,
            requires_activation,
            "volume license overwrites the writable license"
        );
        self.adopt(candidate);
        if !requires_activation {
            self.record.downloadable_validated_at = validated_at;
            self.record.authorized_identifiers = authorized;
        }

        self.save_license_file_inner()?;
        let path = self.config.license_file_path.clone();
        self.load_file_inner(&path)
    }
}
