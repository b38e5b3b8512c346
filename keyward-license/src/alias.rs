//! License aliases.
//!
//! An alias is a redundant, signed copy of the license kept at an
//! independent location. Aliases are peers: the freshest one is chosen by
//! its `last_updated` stamp alone. They let the engine recover a license
//! whose primary file was deleted, and detect a primary file that was
//! rolled back to an older copy.

use crate::codec::LicenseCodec;
use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A place where an alias copy can be stored.
pub trait AliasLocation: Send + Sync {
    /// Human-readable name of the location.
    fn name(&self) -> &str;

    /// Reads the stored blob, or `None` if nothing has been stored yet.
    fn load(&self) -> LicenseResult<Option<Vec<u8>>>;

    /// Replaces the stored blob.
    fn save(&self, contents: &[u8]) -> LicenseResult<()>;
}

/// An alias kept in a plain file.
#[derive(Debug, Clone)]
pub struct FileAlias {
    name: String,
    path: PathBuf,
}

impl FileAlias {
    /// Creates a file alias named after its path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
        }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AliasLocation for FileAlias {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> LicenseResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LicenseError::Storage(format!(
                "failed to read alias {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn save(&self, contents: &[u8]) -> LicenseResult<()> {
        write_file(&self.path, contents)
    }
}

/// A loaded alias copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Location name.
    pub name: String,
    /// When the copy was written (`None` = never, or unusable).
    pub last_updated: Option<DateTime<Utc>>,
    /// Signed blob as stored.
    pub contents: Vec<u8>,
}

impl Alias {
    /// The sentinel returned when no usable alias exists.
    #[must_use]
    pub fn never_updated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_updated: None,
            contents: Vec::new(),
        }
    }

    /// Returns true for the sentinel.
    #[must_use]
    pub fn is_never_updated(&self) -> bool {
        self.last_updated.is_none()
    }
}

/// Outcome of loading every alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasReport {
    /// Number of alias locations.
    pub total: usize,
    /// Locations that held any data.
    pub present: usize,
    /// Locations whose data verified and belongs to this product.
    pub valid: usize,
    /// One entry per location; unusable ones are sentinels.
    pub aliases: Vec<Alias>,
}

/// Outcome of writing every alias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AliasWriteReport {
    pub attempted: usize,
    pub succeeded: usize,
}

/// Loads and verifies every alias.
pub fn check_aliases(
    locations: &[Box<dyn AliasLocation>],
    codec: &dyn LicenseCodec,
    product_id: u32,
) -> AliasReport {
    let mut report = AliasReport {
        total: locations.len(),
        ..AliasReport::default()
    };

    for location in locations {
        let contents = match location.load() {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                report.aliases.push(Alias::never_updated(location.name()));
                continue;
            }
            Err(e) => {
                debug!(alias = location.name(), error = %e, "alias unreadable");
                report.aliases.push(Alias::never_updated(location.name()));
                continue;
            }
        };
        report.present += 1;

        match codec.decode(&contents) {
            Ok(record) if record.product_id == product_id => {
                report.valid += 1;
                report.aliases.push(Alias {
                    name: location.name().to_string(),
                    last_updated: record.last_updated,
                    contents,
                });
            }
            Ok(record) => {
                debug!(
                    alias = location.name(),
                    product_id = record.product_id,
                    "alias belongs to another product"
                );
                report.aliases.push(Alias::never_updated(location.name()));
            }
            Err(e) => {
                debug!(alias = location.name(), error = %e, "alias failed verification");
                report.aliases.push(Alias::never_updated(location.name()));
            }
        }
    }

    report
}

/// Returns the alias with the latest `last_updated`, or the sentinel if none was ever updated.
#[must_use]
pub fn most_current_alias(aliases: &[Alias]) -> Alias {
    aliases
        .iter()
        .filter(|a| !a.is_never_updated())
        .max_by_key(|a| a.last_updated)
        .cloned()
        .unwrap_or_else(|| Alias::never_updated(""))
}

/// Writes `contents` to every alias location.
pub fn write_aliases(locations: &[Box<dyn AliasLocation>], contents: &[u8]) -> AliasWriteReport {
    let mut report = AliasWriteReport {
        attempted: locations.len(),
        succeeded: 0,
    };
    for location in locations {
        match location.save(contents) {
            Ok(()) => report.succeeded += 1,
            Err(e) => debug!(alias = location.name(), error = %e, "alias write failed"),
        }
    }
    report
}

/// Writes a file through a sibling temp file, creating parent directories.
pub(crate) fn write_file(path: &Path, contents: &[u8]) -> LicenseResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            LicenseError::Storage(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp, contents)
        .map_err(|e| LicenseError::Storage(format!("failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path).map_err(|e| {
        LicenseError::Storage(format!("failed to replace {}: {e}", path.display()))
    })
}
