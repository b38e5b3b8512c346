//! Trigger codes.
//!
//! A trigger code is a short number, usually entered by the user together
//! with a license ID, that moves the license into a new state. Codes that
//! carry a duration take it as event data, in days.

use crate::error::{LicenseError, LicenseResult};
use crate::license::WritableLicense;
use keyward_types::LicenseType;
use tracing::{info, warn};

/// The state transitions a trigger code can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCode {
    /// Codes 1 and 28: full, non-expiring license.
    ActivateFull,
    /// Codes 10 and 29 (extending) and 11 (counting from today): time-limited license.
    ActivateTimeLimited { extend_existing: bool },
    /// Code 18: validates a downloadable license.
    ValidateDownloadable,
    /// Code 20: extends the evaluation.
    ExtendEvaluation,
}

impl TriggerCode {
    /// Maps a trigger code number to its transition.
    #[must_use]
    pub fn from_number(code: u32) -> Option<Self> {
        match code {
            1 | 28 => Some(Self::ActivateFull),
            10 | 29 => Some(Self::ActivateTimeLimited {
                extend_existing: true,
            }),
            11 => Some(Self::ActivateTimeLimited {
                extend_existing: false,
            }),
            18 => Some(Self::ValidateDownloadable),
            20 => Some(Self::ExtendEvaluation),
            _ => None,
        }
    }

    /// Returns true if the event data is a duration that must be at least one day.
    #[must_use]
    pub fn takes_duration(&self) -> bool {
        matches!(
            self,
            Self::ActivateTimeLimited { .. } | Self::ExtendEvaluation
        )
    }
}

impl WritableLicense {
    /// Applies a trigger code.
    ///
    /// The password belongs to the issuing protocol and is not checked here.
    /// An unknown code or out-of-range event data fails without touching the
    /// license. Once a code is accepted, failures to persist the new state
    /// are logged and kept in `last_error` but do not fail the call.
    pub fn process_trigger_code(
        &mut self,
        license_id: u32,
        password: &str,
        code: u32,
        event_data: i64,
    ) -> LicenseResult<()> {
        let result = self.process_trigger_code_inner(license_id, password, code, event_data);
        self.track(result)
    }

    fn process_trigger_code_inner(
        &mut self,
        license_id: u32,
        _password: &str,
        code: u32,
        event_data: i64,
    ) -> LicenseResult<()> {
        let trigger = TriggerCode::from_number(code).ok_or(LicenseError::TriggerCodeInvalid)?;
        if trigger.takes_duration() && event_data < 1 {
            return Err(LicenseError::TriggerCodeEventDataInvalid);
        }

        if license_id > 0 {
            self.record.license_id = license_id;
        }

        match trigger {
            TriggerCode::ActivateFull => {
                // A type change discards the previous activation, including
                // the license ID adopted above.
                if self.record.license_type != LicenseType::FullNonExpiring {
                    self.record.clear_activation_details();
                }
                self.record.license_type = LicenseType::FullNonExpiring;
                self.remove_volume_license();
                self.bind_to_this_machine();
                self.persist_best_effort("trigger code");
            }
            TriggerCode::ActivateTimeLimited { extend_existing } => {
                if self.record.license_type != LicenseType::TimeLimited {
                    self.record.clear_activation_details();
                }
                self.record.license_type = LicenseType::TimeLimited;
                self.record.effective_end_date = self.new_end_date(event_data, extend_existing);
                self.remove_volume_license();
                self.bind_to_this_machine();
                self.persist_best_effort("trigger code");
            }
            TriggerCode::ValidateDownloadable => {
                self.record.license_type = LicenseType::FullNonExpiring;
                self.record.downloadable_validated_at = Some(self.clock.now());
                self.bind_to_this_machine();
                self.persist_best_effort("trigger code");
            }
            TriggerCode::ExtendEvaluation => {
                if let Err(e) = self.create_evaluation_inner(event_data, false, true) {
                    warn!(error = %e, "evaluation extension could not be persisted");
                    self.last_error = Some(e);
                }
            }
        }

        info!(
            code,
            license_type = %self.record.license_type,
            end = %self.record.effective_end_date,
            "trigger code applied"
        );
        Ok(())
    }
}
