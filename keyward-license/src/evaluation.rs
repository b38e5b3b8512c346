//! Evaluation periods.
//!
//! An evaluation is an unlicensed, machine-locked record with a window of
//! `duration` days. A zero or negative duration produces an evaluation that
//! is already over, which is how a license is removed.

use crate::alias::{most_current_alias, write_file};
use crate::duration::{self, add_days};
use crate::error::{LicenseError, LicenseResult};
use crate::license::WritableLicense;
use keyward_types::LicenseType;
use tracing::{debug, info};

impl WritableLicense {
    /// Creates an evaluation license of `duration` days.
    ///
    /// With `check_aliases`, a license recovered from the freshest alias
    /// takes precedence over a new evaluation. With `extend_existing`, the
    /// days still remaining on the current license are added on top.
    pub fn create_evaluation(
        &mut self,
        duration: i64,
        check_aliases: bool,
        extend_existing: bool,
    ) -> LicenseResult<()> {
        let result = self.create_evaluation_inner(duration, check_aliases, extend_existing);
        self.track(result)
    }

    /// Creates the configured fresh evaluation, unless an alias can be recovered.
    pub fn create_fresh_evaluation(&mut self) -> LicenseResult<()> {
        self.create_evaluation(self.config.fresh_evaluation_days, true, false)
    }

    /// Creates an evaluation that ended yesterday.
    pub fn create_expired_evaluation(&mut self) -> LicenseResult<()> {
        self.create_evaluation(-1, false, false)
    }

    pub(crate) fn create_evaluation_inner(
        &mut self,
        duration: i64,
        check_aliases: bool,
        extend_existing: bool,
    ) -> LicenseResult<()> {
        if check_aliases && self.restore_from_alias()? {
            return Ok(());
        }

        let today = self.clock.today();
        self.record.license_type = LicenseType::Unlicensed;
        self.record.product_id = self.config.product_id;
        self.record.product_version.clone_from(&self.config.product_version);
        self.record.clear_activation_details();
        self.remove_volume_license();

        self.record.effective_start_date = if duration > 0 {
            today
        } else {
            add_days(today, duration)
        };
        self.record.effective_end_date = duration::new_end_date(
            today,
            self.record.effective_end_date,
            duration,
            extend_existing,
        );
        self.record.signature_date = self.clock.now();
        self.bind_to_this_machine();

        let written = self.write_aliases_inner(false);
        let required = self.config.alias_quorum(written.attempted);
        if written.succeeded < required {
            return Err(LicenseError::AliasQuorumNotMet {
                written: written.succeeded,
                required,
            });
        }

        self.write_license_file()?;
        info!(
            start = %self.record.effective_start_date,
            end = %self.record.effective_end_date,
            "evaluation license created"
        );
        Ok(())
    }

    /// Restores the license from the freshest alias. Returns false if no alias was ever written.
    fn restore_from_alias(&mut self) -> LicenseResult<bool> {
        let report = self.check_aliases();
        let current = most_current_alias(&report.aliases);
        if current.is_never_updated() {
            return Ok(false);
        }

        debug!(alias = %current.name, "restoring license from alias");
        let path = self.config.license_file_path.clone();
        write_file(&path, &current.contents)?;
        self.load_file_inner(&path)?;
        // Rewriting the aliases restamps the record, so the primary file is
        // re-signed with the same stamp.
        self.save_license_file_inner()?;
        Ok(true)
    }
}
