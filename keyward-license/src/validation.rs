//! The validation pipeline.
//!
//! A license may only be used once every applicable check passes. The
//! option type picks the path: activation-code licenses take the standard
//! path (alias consistency, refresh, then the system checks), volume and
//! downloadable licenses take the volume path, which re-reads the volume
//! file and checks the writable copy against it.

use crate::alias::{self, most_current_alias, AliasLocation};
use crate::codec::LicenseCodec;
use crate::config::LicenseConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::license::WritableLicense;
use crate::refresh::{NetworkTimeSource, RefreshError};
use crate::volume::VolumeLicense;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use keyward_types::{identifiers_match, LicenseRecord, ProductOptionType, SystemIdentifier};
use std::fmt;
use tracing::{debug, warn};

/// A single check of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemValidation {
    /// The clock must not be behind the last write.
    ClockTamper,
    /// The license must be issued for the configured product.
    ProductIdentity,
    /// This machine's identifiers must equal the authorized set.
    SystemIdentifierMatch,
    /// Today must fall inside the effective window.
    EffectiveDateWindow,
    /// Alias copies must verify and must not be newer than the license file.
    AliasConsistency,
    /// The clock must agree with network time.
    NetworkTime,
}

impl fmt::Display for SystemValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClockTamper => "clock-tamper",
            Self::ProductIdentity => "product-identity",
            Self::SystemIdentifierMatch => "system-identifier-match",
            Self::EffectiveDateWindow => "effective-date-window",
            Self::AliasConsistency => "alias-consistency",
            Self::NetworkTime => "network-time",
        };
        f.write_str(s)
    }
}

/// Everything a check may look at.
pub struct ValidationContext<'a> {
    pub record: &'a LicenseRecord,
    pub config: &'a LicenseConfig,
    pub now: DateTime<Utc>,
    pub current_identifiers: Vec<SystemIdentifier>,
    pub aliases: &'a [Box<dyn AliasLocation>],
    pub codec: &'a dyn LicenseCodec,
    pub network_time: Option<&'a dyn NetworkTimeSource>,
}

impl SystemValidation {
    /// Runs this check.
    pub fn check(&self, ctx: &ValidationContext<'_>) -> LicenseResult<()> {
        match self {
            Self::ClockTamper => check_clock(ctx),
            Self::ProductIdentity => {
                if ctx.record.product_id == ctx.config.product_id {
                    Ok(())
                } else {
                    Err(LicenseError::ProductMismatch {
                        expected: ctx.config.product_id,
                        found: ctx.record.product_id,
                    })
                }
            }
            Self::SystemIdentifierMatch => {
                if identifiers_match(&ctx.record.authorized_identifiers, &ctx.current_identifiers)
                {
                    Ok(())
                } else {
                    Err(LicenseError::SystemIdentifiersMismatch)
                }
            }
            Self::EffectiveDateWindow => check_window(ctx.record, ctx.now.date_naive()),
            Self::AliasConsistency => check_alias_consistency(ctx),
            Self::NetworkTime => check_network_time(ctx),
        }
    }
}

/// Runs `checks` in order, stopping at the first failure.
pub fn run_checks(checks: &[SystemValidation], ctx: &ValidationContext<'_>) -> LicenseResult<()> {
    for check in checks {
        if let Err(e) = check.check(ctx) {
            debug!(check = %check, error = %e, "validation check failed");
            return Err(e);
        }
    }
    Ok(())
}

/// Fails with `NotEffectiveYet` or `Expired` unless `today` is inside the record's window.
pub(crate) fn check_window(record: &LicenseRecord, today: NaiveDate) -> LicenseResult<()> {
    if record.is_effective_on(today) {
        Ok(())
    } else if today < record.effective_start_date {
        Err(LicenseError::NotEffectiveYet)
    } else {
        Err(LicenseError::Expired(record.effective_end_date.to_string()))
    }
}

fn check_clock(ctx: &ValidationContext<'_>) -> LicenseResult<()> {
    let Some(last_updated) = ctx.record.last_updated else {
        return Ok(());
    };
    if ctx.now + Duration::seconds(ctx.config.clock_tolerance_secs) < last_updated {
        return Err(LicenseError::ClockTampered {
            now: ctx.now,
            last_updated,
        });
    }
    Ok(())
}

fn check_alias_consistency(ctx: &ValidationContext<'_>) -> LicenseResult<()> {
    let report = alias::check_aliases(ctx.aliases, ctx.codec, ctx.config.product_id);
    if report.total == 0 {
        return Ok(());
    }
    if report.present > 0 && report.valid == 0 {
        return Err(LicenseError::AliasInvalid(format!(
            "none of {} alias copies verified",
            report.present
        )));
    }

    // A license file older than its freshest alias has been rolled back.
    let current = most_current_alias(&report.aliases);
    if !current.is_never_updated() && current.last_updated > ctx.record.last_updated {
        return Err(LicenseError::AliasInvalid(format!(
            "license file is older than alias {}",
            current.name
        )));
    }
    Ok(())
}

fn check_network_time(ctx: &ValidationContext<'_>) -> LicenseResult<()> {
    let Some(source) = ctx.network_time else {
        return Err(LicenseError::NetworkTime(
            "no network time source configured".to_string(),
        ));
    };
    let network_now = source.network_time()?;
    let skew_secs = (ctx.now - network_now).num_seconds();
    if skew_secs.abs() > ctx.config.network_time_tolerance_secs {
        return Err(LicenseError::NetworkTimeSkew { skew_secs });
    }
    Ok(())
}

impl WritableLicense {
    /// Runs the validation pipeline for the in-memory license.
    pub fn validate(&mut self) -> LicenseResult<()> {
        let result = self.validate_inner();
        if result.is_ok() {
            debug!(
                license_type = %self.record.license_type,
                option = %self.record.product_option,
                "license validated"
            );
        }
        self.track(result)
    }

    /// Runs the volume path of the pipeline against the volume license file.
    pub fn validate_volume(&mut self) -> LicenseResult<()> {
        let result = self.validate_volume_inner();
        self.track(result)
    }

    pub(crate) fn validate_inner(&mut self) -> LicenseResult<()> {
        let option = self.record.product_option;
        if option == ProductOptionType::DownloadableLicenseWithTriggerCodeValidation
            && self.record.downloadable_validated_at.is_none()
        {
            return Err(LicenseError::NotEffectiveYet);
        }
        if option.is_volume_kind() {
            return self.validate_volume_inner();
        }

        let activated = self.record.is_activated();

        let mut alias_error = None;
        if let Err(e) = run_checks(&[SystemValidation::AliasConsistency], &self.context()) {
            if !self.config.refresh.enabled || !activated {
                return Err(e);
            }
            alias_error = Some(e);
        }

        let now = self.clock.now();
        let signature_date = self.record.signature_date;
        if activated
            && (alias_error.is_some() || self.config.refresh.is_attempt_due(signature_date, now))
        {
            match self.request_refresh(&self.record) {
                Ok(refreshed) => {
                    debug!(license_id = refreshed.license_id, "license refreshed");
                    self.adopt(refreshed);
                    self.persist_best_effort("refresh");
                }
                Err(e) => {
                    let required = self.config.refresh.is_required(signature_date, now);
                    if !(e.is_unreachable() && alias_error.is_none() && !required) {
                        return Err(alias_error
                            .unwrap_or_else(|| LicenseError::RefreshFailed(e.to_string())));
                    }
                    warn!(error = %e, "license refresh skipped, service unreachable");
                }
            }
        }

        let mut checks = vec![
            SystemValidation::ClockTamper,
            SystemValidation::ProductIdentity,
            SystemValidation::SystemIdentifierMatch,
        ];
        if self.record.license_type.is_time_bound() {
            checks.push(SystemValidation::EffectiveDateWindow);
            if self.config.network_time_check {
                checks.push(SystemValidation::NetworkTime);
            }
        }
        run_checks(&checks, &self.context())
    }

    pub(crate) fn validate_volume_inner(&mut self) -> LicenseResult<()> {
        let volume = VolumeLicense::load(
            &self.config.volume_license_file_path,
            self.codec.as_ref(),
        )?;
        if self.record.license_id != volume.record().license_id {
            return Err(LicenseError::IdentifiersMismatch);
        }
        volume.validate(self.config.product_id, self.clock.today())?;

        if self.config.refresh.volume_refresh_enabled {
            self.refresh_volume(volume.record())?;
        }

        let mut checks = vec![SystemValidation::ClockTamper];
        if self.record.product_option
            == ProductOptionType::DownloadableLicenseWithTriggerCodeValidation
        {
            checks.push(SystemValidation::SystemIdentifierMatch);
        }
        run_checks(&checks, &self.context())
    }

    fn refresh_volume(&mut self, volume: &LicenseRecord) -> LicenseResult<()> {
        let now = self.clock.now();
        if !volume.is_activated() || !self.config.refresh.is_attempt_due(volume.signature_date, now)
        {
            return Ok(());
        }

        match self.request_refresh(volume) {
            Ok(refreshed) => {
                debug!(license_id = refreshed.license_id, "volume license refreshed");
                // Written through the application codec, so the file is now
                // signed with the application key rather than the issuer's.
                let path = self.config.volume_license_file_path.clone();
                let saved = VolumeLicense::from_record(refreshed).save(&path, self.codec.as_ref());
                if let Err(e) = saved {
                    warn!(error = %e, "refreshed volume license could not be saved");
                    self.last_error = Some(e);
                }
                Ok(())
            }
            Err(e)
                if e.is_unreachable()
                    && !self.config.refresh.is_required(volume.signature_date, now) =>
            {
                warn!(error = %e, "volume license refresh skipped, service unreachable");
                Ok(())
            }
            Err(e) => Err(LicenseError::RefreshFailed(e.to_string())),
        }
    }

    fn request_refresh(&self, record: &LicenseRecord) -> Result<LicenseRecord, RefreshError> {
        match &self.refresh {
            Some(service) => service.refresh(record),
            None => Err(RefreshError::ServiceUnreachable(
                "no refresh service configured".to_string(),
            )),
        }
    }

    pub(crate) fn context(&self) -> ValidationContext<'_> {
        ValidationContext {
            record: &self.record,
            config: &self.config,
            now: self.clock.now(),
            current_identifiers: self.identifiers.current_identifiers(),
            aliases: &self.aliases,
            codec: self.codec.as_ref(),
            network_time: self.network_time.as_deref(),
        }
    }
}
