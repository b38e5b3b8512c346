//! The writable license engine.
//!
//! `WritableLicense` owns the in-memory `LicenseRecord` and every
//! collaborator it needs. Its operations are spread over sibling modules:
//! evaluation creation (`evaluation`), reconciliation on start-up
//! (`reconcile`), the validation pipeline (`validation`) and trigger codes
//! (`trigger`). This module holds construction, persistence and the
//! last-error slot.
//!
//! Every public operation returns a `LicenseResult` and, on failure, also
//! records the error so it can be inspected later through `last_error`.

use crate::alias::{
    self, write_file, AliasLocation, AliasReport, AliasWriteReport, FileAlias,
};
use crate::clock::{Clock, SystemClock};
use crate::codec::LicenseCodec;
use crate::config::LicenseConfig;
use crate::device::SystemIdentifierSource;
use crate::duration;
use crate::error::{LicenseError, LicenseResult};
use crate::refresh::{NetworkTimeSource, RefreshService};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use keyward_types::{identifiers_match, LicenseRecord, LicenseType, ProductOptionType};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A self-maintained, signed license file and the logic around it.
pub struct WritableLicense {
    pub(crate) config: LicenseConfig,
    pub(crate) record: LicenseRecord,
    pub(crate) codec: Box<dyn LicenseCodec>,
    pub(crate) identifiers: Box<dyn SystemIdentifierSource>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) aliases: Vec<Box<dyn AliasLocation>>,
    pub(crate) refresh: Option<Box<dyn RefreshService>>,
    pub(crate) network_time: Option<Box<dyn NetworkTimeSource>>,
    pub(crate) last_error: Option<LicenseError>,
}

impl WritableLicense {
    /// Creates an engine with the system clock and one `FileAlias` per configured alias path.
    ///
    /// Nothing is read from disk until `initialize` or `load_file` is called.
    pub fn new(
        config: LicenseConfig,
        codec: impl LicenseCodec + 'static,
        identifiers: impl SystemIdentifierSource + 'static,
    ) -> LicenseResult<Self> {
        config.check()?;
        let aliases = config
            .alias_paths
            .iter()
            .map(|p| Box::new(FileAlias::new(p)) as Box<dyn AliasLocation>)
            .collect();
        let record = LicenseRecord::unlicensed(
            config.product_id,
            DateTime::<Utc>::UNIX_EPOCH.date_naive(),
            DateTime::<Utc>::UNIX_EPOCH,
        );
        Ok(Self {
            config,
            record,
            codec: Box::new(codec),
            identifiers: Box::new(identifiers),
            clock: Arc::new(SystemClock),
            aliases,
            refresh: None,
            network_time: None,
            last_error: None,
        })
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Adds an alias location beyond the configured file aliases.
    #[must_use]
    pub fn with_alias(mut self, location: impl AliasLocation + 'static) -> Self {
        self.aliases.push(Box::new(location));
        self
    }

    /// Sets the online refresh service.
    #[must_use]
    pub fn with_refresh_service(mut self, service: impl RefreshService + 'static) -> Self {
        self.refresh = Some(Box::new(service));
        self
    }

    /// Sets the network time source used when `network_time_check` is enabled.
    #[must_use]
    pub fn with_network_time_source(mut self, source: impl NetworkTimeSource + 'static) -> Self {
        self.network_time = Some(Box::new(source));
        self
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Returns the in-memory license record.
    #[must_use]
    pub fn record(&self) -> &LicenseRecord {
        &self.record
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    /// Returns the license type.
    #[must_use]
    pub fn license_type(&self) -> LicenseType {
        self.record.license_type
    }

    /// Returns the most recent failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&LicenseError> {
        self.last_error.as_ref()
    }

    /// Whole days left before the license expires (negative once expired).
    #[must_use]
    pub fn remaining_days(&self) -> i64 {
        self.record.remaining_days(self.clock.today())
    }

    /// Computes an end date `duration` days from today, optionally on top of the remaining days.
    #[must_use]
    pub fn new_end_date(&self, duration: i64, extend_existing: bool) -> NaiveDate {
        duration::new_end_date(
            self.clock.today(),
            self.record.effective_end_date,
            duration,
            extend_existing,
        )
    }

    // ── Loading ──────────────────────────────────────────────────

    /// Loads and verifies a license file, replacing the in-memory record.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> LicenseResult<()> {
        let result = self.load_file_inner(path.as_ref());
        self.track(result)
    }

    /// Loads and verifies a signed blob, replacing the in-memory record.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> LicenseResult<()> {
        let result = self.codec.decode(bytes).map(|record| self.record = record);
        self.track(result)
    }

    pub(crate) fn load_file_inner(&mut self, path: &Path) -> LicenseResult<()> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                LicenseError::Storage(format!("license file not found: {}", path.display()))
            }
            _ => LicenseError::Storage(format!("failed to read {}: {e}", path.display())),
        })?;
        self.record = self.codec.decode(&bytes)?;
        Ok(())
    }

    // ── Persistence ──────────────────────────────────────────────

    /// Writes every alias, then the primary license file.
    ///
    /// Alias failures are logged but do not fail the save; only the primary
    /// write decides the result.
    pub fn save_license_file(&mut self) -> LicenseResult<()> {
        let result = self.save_license_file_inner();
        self.track(result)
    }

    pub(crate) fn save_license_file_inner(&mut self) -> LicenseResult<()> {
        let written = self.write_aliases_inner(false);
        if written.succeeded < written.attempted {
            warn!(
                attempted = written.attempted,
                succeeded = written.succeeded,
                "not every license alias could be written"
            );
        }
        self.write_license_file()
    }

    /// Installs new signed license content, e.g. a license delivered by the issuer.
    ///
    /// Volume and downloadable content is also saved as the volume license
    /// file. Every alias must be written. Unless `force_alias_updates` is set,
    /// aliases are left alone while the clock appears to be back-dated, which
    /// makes this call fail.
    pub fn install_license_content(
        &mut self,
        content: &[u8],
        force_alias_updates: bool,
    ) -> LicenseResult<()> {
        let result = self.install_license_content_inner(content, force_alias_updates);
        self.track(result)
    }

    fn install_license_content_inner(
        &mut self,
        content: &[u8],
        force_alias_updates: bool,
    ) -> LicenseResult<()> {
        let record = self.codec.decode(content)?;
        self.adopt(record);

        if self.record.product_option.is_volume_kind() {
            write_file(&self.config.volume_license_file_path, content)?;
        }

        let written = self.write_aliases_inner(force_alias_updates);
        if written.succeeded != written.attempted {
            return Err(LicenseError::AliasQuorumNotMet {
                written: written.succeeded,
                required: written.attempted,
            });
        }

        self.write_license_file()
    }

    /// Persists the license when the application closes.
    ///
    /// Nothing is written unless this machine's identifiers still match the
    /// authorized ones, so a copied license is never re-stamped elsewhere.
    pub fn unload(&mut self) {
        let current = self.identifiers.current_identifiers();
        if !identifiers_match(&self.record.authorized_identifiers, &current) {
            debug!("system identifiers changed, license not saved on unload");
            return;
        }

        let written = self.write_aliases_inner(false);
        debug!(
            attempted = written.attempted,
            succeeded = written.succeeded,
            "aliases written on unload"
        );
        if let Err(e) = self.write_license_file() {
            warn!(error = %e, "failed to save license on unload");
            self.last_error = Some(e);
        }
    }

    /// Removes the license by replacing it with an already-expired evaluation.
    pub fn remove_license(&mut self) -> LicenseResult<()> {
        self.create_expired_evaluation()
    }

    /// Drops any link to a volume or downloadable license.
    pub fn remove_volume_license(&mut self) {
        self.record.downloadable_validated_at = None;
        self.record.product_option = ProductOptionType::ActivationCode;

        let path = &self.config.volume_license_file_path;
        if path.exists() {
            // Ignored: if the file survives, the next reconciliation sees a
            // volume file next to an activation-code license and overwrites,
            // so the inconsistency is caught there.
            if let Err(e) = fs::remove_file(path) {
                debug!(path = %path.display(), error = %e, "volume license not deleted");
            }
        }
    }

    /// Clears the license ID, installation ID and installation name.
    pub fn clear_activation_details(&mut self) {
        self.record.clear_activation_details();
    }

    // ── Aliases ──────────────────────────────────────────────────

    /// Loads and verifies every alias.
    #[must_use]
    pub fn check_aliases(&self) -> AliasReport {
        alias::check_aliases(&self.aliases, self.codec.as_ref(), self.config.product_id)
    }

    /// Writes the current record to every alias.
    ///
    /// Unless `force` is set, nothing is written while the clock appears to
    /// be back-dated.
    pub fn write_aliases(&mut self, force: bool) -> AliasWriteReport {
        self.write_aliases_inner(force)
    }

    pub(crate) fn write_aliases_inner(&mut self, force: bool) -> AliasWriteReport {
        if self.aliases.is_empty() {
            return AliasWriteReport::default();
        }
        if !force && self.clock_is_backdated() {
            warn!("system clock appears back-dated, aliases not updated");
            return AliasWriteReport {
                attempted: self.aliases.len(),
                succeeded: 0,
            };
        }

        self.stamp();
        match self.codec.encode(&self.record) {
            Ok(contents) => alias::write_aliases(&self.aliases, &contents),
            Err(e) => {
                warn!(error = %e, "failed to encode license for aliases");
                AliasWriteReport {
                    attempted: self.aliases.len(),
                    succeeded: 0,
                }
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────

    /// Signs and writes the record to the primary license file.
    pub(crate) fn write_license_file(&mut self) -> LicenseResult<()> {
        self.stamp();
        let contents = self.codec.encode(&self.record)?;
        write_file(&self.config.license_file_path, &contents)
    }

    /// Stamps the record as written now, never moving the stamp backwards.
    fn stamp(&mut self) {
        let now = self.clock.now();
        self.record.last_updated = Some(match self.record.last_updated {
            Some(prev) if prev > now => prev,
            _ => now,
        });
    }

    /// Returns true if the clock is behind the last write by more than the tolerance.
    pub(crate) fn clock_is_backdated(&self) -> bool {
        let tolerance = Duration::seconds(self.config.clock_tolerance_secs);
        self.record
            .last_updated
            .is_some_and(|last| self.clock.now() + tolerance < last)
    }

    /// Replaces the record, keeping the later of the two write stamps.
    pub(crate) fn adopt(&mut self, mut record: LicenseRecord) {
        record.last_updated = record.last_updated.max(self.record.last_updated);
        self.record = record;
    }

    /// Binds the record to the identifiers of this machine.
    pub(crate) fn bind_to_this_machine(&mut self) {
        self.record.authorized_identifiers = self.identifiers.current_identifiers();
    }

    /// Saves the license, logging and recording a failure instead of returning it.
    pub(crate) fn persist_best_effort(&mut self, context: &str) {
        if let Err(e) = self.save_license_file_inner() {
            warn!(context, error = %e, "license could not be persisted");
            self.last_error = Some(e);
        }
    }

    /// Records a failure in the last-error slot and passes the result through.
    pub(crate) fn track<T>(&mut self, result: LicenseResult<T>) -> LicenseResult<T> {
        if let Err(e) = &result {
            self.last_error = Some(e.clone());
        }
        result
    }
}

impl std::fmt::Debug for WritableLicense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritableLicense")
            .field("config", &self.config)
            .field("record", &self.record)
            .field("aliases", &self.aliases.len())
            .field("refresh", &self.refresh.is_some())
            .field("last_error", &self.last_error)
            .finish()
    }
}
