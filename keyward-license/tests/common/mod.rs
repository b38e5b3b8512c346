//! Shared test helpers for license engine tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use keyward_license::{
    AliasLocation, FixedClock, LicenseCodec, LicenseConfig, LicenseError, LicenseRecord,
    LicenseResult, LicenseType, NetworkTimeSource, ProductOptionType, RefreshError,
    RefreshService, SignedEnvelopeCodec, StaticIdentifiers, SystemIdentifier, WritableLicense,
};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const PRODUCT_ID: u32 = 4711;

/// Seed of the application's own signing key.
pub const APP_SEED: [u8; 32] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26,
    27, 28, 29, 30, 31, 32,
];

/// Seed of the vendor key that signs volume licenses.
pub const ISSUER_SEED: [u8; 32] = [
    32, 31, 30, 29, 28, 27, 26, 25, 24, 23, 22, 21, 20, 19, 18, 17, 16, 15, 14, 13, 12, 11, 10, 9,
    8, 7, 6, 5, 4, 3, 2, 1,
];

/// The fixed "now" every test starts at.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    t0().date_naive()
}

pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

/// The application codec: signs with the app key, trusts the issuer key.
pub fn codec() -> SignedEnvelopeCodec {
    SignedEnvelopeCodec::new(&APP_SEED)
        .with_trusted_issuer(&issuer_codec().public_key())
        .unwrap()
}

/// The vendor codec used to issue volume licenses.
pub fn issuer_codec() -> SignedEnvelopeCodec {
    SignedEnvelopeCodec::new(&ISSUER_SEED)
}

pub fn machine() -> Vec<SystemIdentifier> {
    vec![
        SystemIdentifier::new("hostname", "aGVsbG8td29ybGQ="),
        SystemIdentifier::new("machine", "bWFjaGluZS1h"),
    ]
}

pub fn other_machine() -> Vec<SystemIdentifier> {
    vec![
        SystemIdentifier::new("hostname", "b3RoZXItaG9zdA=="),
        SystemIdentifier::new("machine", "bWFjaGluZS1i"),
    ]
}

/// Routes engine logs to the test output; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Harness ──────────────────────────────────────────────────────

/// A license directory with two file aliases and a pinned clock.
pub struct Harness {
    pub dir: TempDir,
    pub clock: Arc<FixedClock>,
    pub config: LicenseConfig,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let config = LicenseConfig::in_dir(PRODUCT_ID, dir.path().join("license"))
            .with_alias(dir.path().join("alias-a").join("a.lic"))
            .with_alias(dir.path().join("alias-b").join("b.lic"));
        Self {
            dir,
            clock: Arc::new(FixedClock::new(t0())),
            config,
        }
    }

    pub fn without_aliases() -> Self {
        let mut harness = Self::new();
        harness.config.alias_paths.clear();
        harness
    }

    /// An engine running on `machine()`.
    pub fn license(&self) -> WritableLicense {
        self.license_on(machine())
    }

    pub fn license_on(&self, identifiers: Vec<SystemIdentifier>) -> WritableLicense {
        WritableLicense::new(self.config.clone(), codec(), StaticIdentifiers(identifiers))
            .unwrap()
            .with_clock(self.clock.clone())
    }

    pub fn license_path(&self) -> PathBuf {
        self.config.license_file_path.clone()
    }

    pub fn volume_path(&self) -> PathBuf {
        self.config.volume_license_file_path.clone()
    }

    /// Decodes the writable license file.
    pub fn stored(&self) -> LicenseRecord {
        codec().decode(&fs::read(self.license_path()).unwrap()).unwrap()
    }

    /// Issues a volume license file signed by the vendor key.
    pub fn issue_volume(&self, record: &LicenseRecord) {
        let path = self.volume_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, issuer_codec().encode(record).unwrap()).unwrap();
    }

    /// Installs vendor-signed content into a fresh engine.
    pub fn install(&self, record: &LicenseRecord) -> WritableLicense {
        let mut license = self.license();
        let content = issuer_codec().encode(record).unwrap();
        license.install_license_content(&content, false).unwrap();
        license
    }
}

// ── Records ──────────────────────────────────────────────────────

/// A volume-kind license issued by the vendor.
pub fn volume_record(
    option: ProductOptionType,
    license_id: u32,
    signature_date: DateTime<Utc>,
) -> LicenseRecord {
    let mut record = LicenseRecord::unlicensed(PRODUCT_ID, days_from_today(-10), signature_date);
    record.license_id = license_id;
    record.license_type = LicenseType::FullNonExpiring;
    record.product_option = option;
    record.effective_end_date = days_from_today(365);
    record
}

/// An activated, machine-locked license with an installation ID.
pub fn activated_record(license_type: LicenseType, signature_date: DateTime<Utc>) -> LicenseRecord {
    let mut record = LicenseRecord::unlicensed(PRODUCT_ID, today(), signature_date);
    record.license_id = 321;
    record.installation_id = "INST-7".to_string();
    record.installation_name = "Workstation".to_string();
    record.license_type = license_type;
    record.effective_end_date = days_from_today(90);
    record.authorized_identifiers = machine();
    record
}

// ── Collaborators ────────────────────────────────────────────────

/// An alias location that can be read but never written.
pub struct FailingAlias;

impl AliasLocation for FailingAlias {
    fn name(&self) -> &str {
        "read-only"
    }

    fn load(&self) -> LicenseResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn save(&self, _contents: &[u8]) -> LicenseResult<()> {
        Err(LicenseError::Storage("alias location is read-only".to_string()))
    }
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Returns the record re-signed at the given time.
    Resign(DateTime<Utc>),
    Unreachable,
    Rejected,
}

/// A refresh service with a scripted outcome that counts its calls.
#[derive(Debug, Clone)]
pub struct FakeRefresh {
    outcome: RefreshOutcome,
    calls: Arc<AtomicUsize>,
}

impl FakeRefresh {
    pub fn new(outcome: RefreshOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RefreshService for FakeRefresh {
    fn refresh(&self, record: &LicenseRecord) -> Result<LicenseRecord, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            RefreshOutcome::Resign(at) => {
                let mut refreshed = record.clone();
                refreshed.signature_date = *at;
                Ok(refreshed)
            }
            RefreshOutcome::Unreachable => Err(RefreshError::ServiceUnreachable(
                "connection refused".to_string(),
            )),
            RefreshOutcome::Rejected => Err(RefreshError::Rejected("license revoked".to_string())),
        }
    }
}

/// A network time source reporting a fixed time, or failing.
pub struct FakeNetworkTime(pub Option<DateTime<Utc>>);

impl NetworkTimeSource for FakeNetworkTime {
    fn network_time(&self) -> LicenseResult<DateTime<Utc>> {
        self.0
            .ok_or_else(|| LicenseError::NetworkTime("time server timed out".to_string()))
    }
}
