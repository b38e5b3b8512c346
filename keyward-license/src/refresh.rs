//! Online collaborators: license refresh and network time.
//!
//! The transport behind these traits (web service calls, retries, TLS, NTP)
//! belongs to the host application.

use crate::error::LicenseResult;
use chrono::{DateTime, Utc};
use keyward_types::LicenseRecord;
use thiserror::Error;

/// Why a refresh did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The issuing service could not be reached. Tolerated unless a refresh is mandatory.
    #[error("refresh service unreachable: {0}")]
    ServiceUnreachable(String),

    /// The issuing service answered and refused the license.
    #[error("refresh rejected: {0}")]
    Rejected(String),
}

impl RefreshError {
    /// Returns true if the service could not be reached.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::ServiceUnreachable(_))
    }
}

/// Re-validates a license with its issuing authority.
pub trait RefreshService: Send + Sync {
    /// Returns the refreshed record (new signature date and any updated fields).
    fn refresh(&self, record: &LicenseRecord) -> Result<LicenseRecord, RefreshError>;
}

/// Supplies trusted time from the network.
pub trait NetworkTimeSource: Send + Sync {
    /// Returns the current network time.
    fn network_time(&self) -> LicenseResult<DateTime<Utc>>;
}
