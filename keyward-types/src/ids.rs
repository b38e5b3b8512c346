//! System identifiers used to lock a license to a machine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single machine-fingerprint value, tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SystemIdentifier {
    /// Name of the identifier algorithm (e.g. `"hostname"`).
    pub name: String,
    /// Opaque identifier value.
    pub value: String,
}

impl SystemIdentifier {
    /// Creates a new identifier.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for SystemIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Returns true if the authorized and current identifiers are exactly the same set.
///
/// Order and duplicates are ignored; every authorized identifier must be
/// present on this machine and no extra identifier may appear.
#[must_use]
pub fn identifiers_match(authorized: &[SystemIdentifier], current: &[SystemIdentifier]) -> bool {
    let authorized: BTreeSet<&SystemIdentifier> = authorized.iter().collect();
    let current: BTreeSet<&SystemIdentifier> = current.iter().collect();
    authorized == current
}
