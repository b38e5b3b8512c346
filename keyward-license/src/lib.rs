//! License lifecycle engine for Keyward.
//!
//! This crate handles:
//! - Reconciling the writable license file with an externally issued
//!   volume/downloadable license file
//! - Evaluation periods, including recovery from alias copies
//! - Activation and upgrades through numeric trigger codes
//! - The validation pipeline run before the application may start
//!
//! # Design Principles
//!
//! - **Deterministic**: every decision depends only on the files on disk,
//!   the configured policy and the injected clock
//! - **Self-maintained**: the writable license is re-signed locally after
//!   every change and mirrored to alias locations
//! - **Tamper-evident**: rolled-back files and back-dated clocks fail validation
//!
//! # Usage
//!
//! ```no_run
//! use keyward_license::{HostIdentifiers, LicenseConfig, SignedEnvelopeCodec, WritableLicense};
//!
//! let config = LicenseConfig::in_dir(1001, "/var/lib/myapp/license");
//! let codec = SignedEnvelopeCodec::new(&[7u8; 32]);
//! let mut license = WritableLicense::new(config, codec, HostIdentifiers)?;
//! if license.initialize().is_err() {
//!     license.process_trigger_code(123_456, "", 1, 0)?;
//! }
//! # Ok::<(), keyward_license::LicenseError>(())
//! ```

mod alias;
mod clock;
mod codec;
mod config;
mod device;
mod duration;
mod error;
mod evaluation;
mod license;
mod reconcile;
mod refresh;
mod trigger;
mod validation;
mod volume;

pub use alias::{
    check_aliases, most_current_alias, write_aliases, Alias, AliasLocation, AliasReport,
    AliasWriteReport, FileAlias,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{LicenseCodec, SignedEnvelopeCodec};
pub use config::{
    DownloadableOverwritePolicy, LicenseConfig, RefreshPolicy, LICENSE_FILE_NAME,
    MAX_TOLERANCE_SECS, VOLUME_LICENSE_FILE_NAME,
};
pub use device::{
    HostIdentifiers, StaticIdentifiers, SystemIdentifierSource, HOSTNAME_IDENTIFIER,
    MACHINE_IDENTIFIER, PLATFORM_IDENTIFIER,
};
pub use duration::new_end_date;
pub use error::{LicenseError, LicenseResult};
pub use license::WritableLicense;
pub use refresh::{NetworkTimeSource, RefreshError, RefreshService};
pub use trigger::TriggerCode;
pub use validation::{run_checks, SystemValidation, ValidationContext};
pub use volume::VolumeLicense;

pub use keyward_types::{
    identifiers_match, LicenseRecord, LicenseType, ProductOptionType, SystemIdentifier,
};
