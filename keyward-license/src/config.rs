//! Engine configuration.
//!
//! Everything the engine needs to know about the host application (product
//! identity, file locations, policy switches) is passed in through a
//! `LicenseConfig`; nothing is read from process-wide state.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the writable license inside a license directory.
pub const LICENSE_FILE_NAME: &str = "license.lic";

/// File name of the volume/downloadable license inside a license directory.
pub const VOLUME_LICENSE_FILE_NAME: &str = "volume.lic";

/// Upper bound for the clock and network time tolerances (one year).
pub const MAX_TOLERANCE_SECS: i64 = 365 * 24 * 60 * 60;

/// Whether a volume/downloadable license on disk may replace a valid
/// writable copy of the same kind, based on its signature date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadableOverwritePolicy {
    /// Accept a volume file signed after the writable copy.
    pub newer_allowed: bool,
    /// Accept a volume file signed before the writable copy.
    pub older_allowed: bool,
    /// A newer volume file must be validated again by trigger code.
    pub newer_requires_activation: bool,
    /// An older volume file must be validated again by trigger code.
    pub older_requires_activation: bool,
}

impl DownloadableOverwritePolicy {
    /// Returns true if either direction is allowed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.newer_allowed || self.older_allowed
    }
}

/// Online refresh schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshPolicy {
    /// Whether refreshing with the issuing service is enabled at all.
    pub enabled: bool,
    /// Days after the signature date when a refresh is attempted (0 = never).
    pub attempt_frequency_days: i64,
    /// Days after the signature date when a successful refresh is mandatory (0 = never).
    pub require_frequency_days: i64,
    /// Whether volume/downloadable licenses are refreshed too.
    pub volume_refresh_enabled: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            attempt_frequency_days: 7,
            require_frequency_days: 30,
            volume_refresh_enabled: false,
        }
    }
}

impl RefreshPolicy {
    /// Returns true if a refresh attempt is due for a license signed at `signature_date`.
    #[must_use]
    pub fn is_attempt_due(&self, signature_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.attempt_frequency_days > 0
            && (now - signature_date).num_days() >= self.attempt_frequency_days
    }

    /// Returns true if a refresh must succeed for a license signed at `signature_date`.
    #[must_use]
    pub fn is_required(&self, signature_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.require_frequency_days > 0
            && (now - signature_date).num_days() >= self.require_frequency_days
    }
}

/// Configuration for a `WritableLicense`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// This application's product ID.
    pub product_id: u32,
    /// This application's version string.
    pub product_version: String,
    /// Path of the writable license file.
    pub license_file_path: PathBuf,
    /// Path of the externally issued volume/downloadable license file.
    pub volume_license_file_path: PathBuf,
    /// Paths of the alias copies.
    pub alias_paths: Vec<PathBuf>,
    /// Length of a fresh evaluation, in days.
    pub fresh_evaluation_days: i64,
    /// Minimum alias writes for a new evaluation to be accepted.
    pub min_alias_writes: usize,
    /// How far the clock may lag behind the last write before it counts as tampering.
    pub clock_tolerance_secs: i64,
    /// Volume/downloadable overwrite rules.
    pub overwrite: DownloadableOverwritePolicy,
    /// Online refresh schedule.
    pub refresh: RefreshPolicy,
    /// Compare the clock against network time for time-bound licenses.
    pub network_time_check: bool,
    /// Allowed difference from network time.
    pub network_time_tolerance_secs: i64,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keyward");
        Self::in_dir(0, dir)
    }
}

impl LicenseConfig {
    /// Creates a configuration keeping every license file under `dir`.
    pub fn in_dir(product_id: u32, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            product_id,
            product_version: String::new(),
            license_file_path: dir.join(LICENSE_FILE_NAME),
            volume_license_file_path: dir.join(VOLUME_LICENSE_FILE_NAME),
            alias_paths: Vec::new(),
            fresh_evaluation_days: 30,
            min_alias_writes: 1,
            clock_tolerance_secs: 10 * 60,
            overwrite: DownloadableOverwritePolicy::default(),
            refresh: RefreshPolicy::default(),
            network_time_check: false,
            network_time_tolerance_secs: 24 * 60 * 60,
        }
    }

    /// Adds an alias location.
    #[must_use]
    pub fn with_alias(mut self, path: impl Into<PathBuf>) -> Self {
        self.alias_paths.push(path.into());
        self
    }

    /// Loads a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> LicenseResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            LicenseError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|e| {
            LicenseError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.check()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot work with.
    pub fn check(&self) -> LicenseResult<()> {
        if self.fresh_evaluation_days < 1 {
            return Err(LicenseError::Config(
                "fresh_evaluation_days must be at least 1".to_string(),
            ));
        }
        if self.license_file_path == self.volume_license_file_path {
            return Err(LicenseError::Config(
                "license and volume license files must differ".to_string(),
            ));
        }
        for (name, value) in [
            ("clock_tolerance_secs", self.clock_tolerance_secs),
            ("network_time_tolerance_secs", self.network_time_tolerance_secs),
        ] {
            if !(0..=MAX_TOLERANCE_SECS).contains(&value) {
                return Err(LicenseError::Config(format!(
                    "{name} must be between 0 and {MAX_TOLERANCE_SECS}"
                )));
            }
        }
        if self.alias_paths.iter().any(|p| p == &self.license_file_path) {
            return Err(LicenseError::Config(
                "an alias cannot live at the license file path".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of alias writes required, given how many aliases exist.
    #[must_use]
    pub fn alias_quorum(&self, configured: usize) -> usize {
        self.min_alias_writes.min(configured)
    }
}
