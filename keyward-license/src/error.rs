//! Error types for the licensing engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Licensing-specific errors.
///
/// Errors are `Clone` so the engine can both return a failure and keep it
/// in its last-error slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicenseError {
    /// The license is not effective yet (or a downloadable license has not been validated).
    #[error("license is not effective yet")]
    NotEffectiveYet,

    /// The license window has ended.
    #[error("license expired on {0}")]
    Expired(String),

    /// The writable license does not belong to the volume license on disk.
    #[error("license identifiers do not match the volume license")]
    IdentifiersMismatch,

    /// Unknown trigger code number.
    #[error("trigger code is invalid")]
    TriggerCodeInvalid,

    /// Trigger code event data out of range.
    #[error("trigger code event data is invalid")]
    TriggerCodeEventDataInvalid,

    /// Online refresh failed.
    #[error("license refresh failed: {0}")]
    RefreshFailed(String),

    /// Signature verification failed.
    #[error("license signature invalid")]
    InvalidSignature,

    /// Blob is not a well-formed signed license.
    #[error("invalid license format: {0}")]
    InvalidFormat(String),

    /// The system clock is earlier than the last recorded write.
    #[error("system clock tampering detected: now {now}, last written {last_updated}")]
    ClockTampered {
        now: DateTime<Utc>,
        last_updated: DateTime<Utc>,
    },

    /// License was issued for another product.
    #[error("license issued for product {found}, expected {expected}")]
    ProductMismatch { expected: u32, found: u32 },

    /// This machine is not authorized to use the license.
    #[error("system identifiers do not match the authorized identifiers")]
    SystemIdentifiersMismatch,

    /// Alias copies are missing or inconsistent with the license file.
    #[error("license alias invalid: {0}")]
    AliasInvalid(String),

    /// Too few alias copies could be written.
    #[error("only {written} of {required} required license aliases written")]
    AliasQuorumNotMet { written: usize, required: usize },

    /// Local clock drifted too far from network time.
    #[error("system clock differs from network time by {skew_secs}s")]
    NetworkTimeSkew { skew_secs: i64 },

    /// Network time could not be obtained.
    #[error("network time unavailable: {0}")]
    NetworkTime(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for LicenseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<keyward_types::Error> for LicenseError {
    fn from(err: keyward_types::Error) -> Self {
        match err {
            keyward_types::Error::Serialization(e) => Self::Serialization(e.to_string()),
            other => Self::InvalidFormat(other.to_string()),
        }
    }
}

impl From<std::io::Error> for LicenseError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
