//! System identifiers for machine-locking.
//!
//! A license is locked to the identifiers collected when it was activated;
//! validation compares them against the identifiers collected now.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use keyward_types::SystemIdentifier;
use sha2::{Digest, Sha256};
use std::env;

/// Identifier algorithm names produced by `HostIdentifiers`.
pub const PLATFORM_IDENTIFIER: &str = "platform";
pub const HOSTNAME_IDENTIFIER: &str = "hostname";
pub const MACHINE_IDENTIFIER: &str = "machine";

/// Supplies the identifiers of the machine the engine is running on.
pub trait SystemIdentifierSource: Send + Sync {
    /// Collects the current identifiers.
    fn current_identifiers(&self) -> Vec<SystemIdentifier>;
}

/// Collects identifiers from the host: platform, hostname and machine ID.
///
/// Hostname and machine ID are hashed so the raw values never end up in a
/// license file.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostIdentifiers;

impl SystemIdentifierSource for HostIdentifiers {
    fn current_identifiers(&self) -> Vec<SystemIdentifier> {
        let mut ids = vec![
            SystemIdentifier::new(
                PLATFORM_IDENTIFIER,
                format!("{}-{}", env::consts::OS, env::consts::ARCH),
            ),
            SystemIdentifier::new(HOSTNAME_IDENTIFIER, digest(&get_hostname())),
        ];

        if let Some(machine_id) = get_machine_id() {
            ids.push(SystemIdentifier::new(MACHINE_IDENTIFIER, digest(&machine_id)));
        }

        ids
    }
}

/// A fixed identifier set, for hosts that fingerprint machines themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentifiers(pub Vec<SystemIdentifier>);

impl SystemIdentifierSource for StaticIdentifiers {
    fn current_identifiers(&self) -> Vec<SystemIdentifier> {
        self.0.clone()
    }
}

fn digest(value: &str) -> String {
    let hash = Sha256::digest(value.as_bytes());
    BASE64.encode(&hash[..16]) // first 16 bytes
}

/// Gets the machine hostname.
fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Gets the machine ID (platform-specific unique identifier).
fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
