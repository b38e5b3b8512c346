//! Core type definitions for Keyward.
//!
//! This crate defines the data carried by a persisted license, independent
//! of how it is signed, stored, or validated:
//! - The license record (identifiers, validity window, discriminants)
//! - License type and product option discriminants
//! - Machine-bound system identifiers
//!
//! Reconciliation, validation, and activation live in `keyward-license`.

mod ids;
mod kinds;
mod record;

pub use ids::{identifiers_match, SystemIdentifier};
pub use kinds::{LicenseType, ProductOptionType};
pub use record::LicenseRecord;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid validity window: start {start} is after end {end}")]
    InvalidWindow {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}
