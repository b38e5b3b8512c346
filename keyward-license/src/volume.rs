//! Externally issued volume and downloadable licenses.
//!
//! A volume license file is issued and signed outside the application and
//! is never modified by trigger codes. The writable license mirrors it, and
//! the volume path of the validation pipeline checks the mirror against a
//! freshly loaded copy on every run.

use crate::alias::write_file;
use crate::codec::LicenseCodec;
use crate::error::{LicenseError, LicenseResult};
use crate::validation::check_window;
use chrono::NaiveDate;
use keyward_types::{LicenseRecord, LicenseType};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// A license loaded from the volume/downloadable license file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLicense {
    record: LicenseRecord,
}

impl VolumeLicense {
    /// Loads and verifies the volume license file.
    pub fn load(path: &Path, codec: &dyn LicenseCodec) -> LicenseResult<Self> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                LicenseError::Storage(format!("volume license not found: {}", path.display()))
            }
            _ => LicenseError::Storage(format!(
                "failed to read volume license {}: {e}",
                path.display()
            )),
        })?;
        Ok(Self {
            record: codec.decode(&bytes)?,
        })
    }

    /// Wraps an already-verified record.
    #[must_use]
    pub fn from_record(record: LicenseRecord) -> Self {
        Self { record }
    }

    /// Returns the record.
    #[must_use]
    pub fn record(&self) -> &LicenseRecord {
        &self.record
    }

    /// Consumes the wrapper, returning the record.
    #[must_use]
    pub fn into_record(self) -> LicenseRecord {
        self.record
    }

    /// Checks the volume license on its own terms.
    ///
    /// The signature was verified on load. This checks that it was issued
    /// for `product_id`, that it really is a volume or downloadable license,
    /// and that a time-limited volume license is inside its window.
    pub fn validate(&self, product_id: u32, today: NaiveDate) -> LicenseResult<()> {
        let record = &self.record;
        if record.product_id != product_id {
            return Err(LicenseError::ProductMismatch {
                expected: product_id,
                found: record.product_id,
            });
        }
        if !record.product_option.is_volume_kind() {
            return Err(LicenseError::InvalidFormat(format!(
                "volume license file holds a {} license",
                record.product_option
            )));
        }
        if record.license_type == LicenseType::TimeLimited {
            check_window(record, today)?;
        }
        Ok(())
    }

    /// Writes the volume license back to `path`.
    pub fn save(&self, path: &Path, codec: &dyn LicenseCodec) -> LicenseResult<()> {
        write_file(path, &codec.encode(&self.record)?)
    }
}
