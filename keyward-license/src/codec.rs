//! Signed license blobs.
//!
//! The engine never looks inside a blob itself; it asks a `LicenseCodec` to
//! turn records into signed bytes and back. `SignedEnvelopeCodec` is the
//! default implementation:
//!
//! `base64url(record_json).base64url(ed25519_signature)`
//!
//! The signature covers the base64url-encoded payload string, not the
//! decoded JSON. Writable licenses are signed with the application's own
//! key; volume licenses issued by the vendor verify against trusted issuer
//! keys.

use crate::error::{LicenseError, LicenseResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use keyward_types::LicenseRecord;
use std::fmt;

/// Turns license records into signed blobs and verifies them on the way back.
pub trait LicenseCodec: Send + Sync {
    /// Signs and serializes a record.
    fn encode(&self, record: &LicenseRecord) -> LicenseResult<Vec<u8>>;

    /// Verifies and deserializes a blob.
    fn decode(&self, bytes: &[u8]) -> LicenseResult<LicenseRecord>;
}

/// Ed25519 envelope codec.
pub struct SignedEnvelopeCodec {
    signing_key: SigningKey,
    trusted: Vec<VerifyingKey>,
}

impl SignedEnvelopeCodec {
    /// Creates a codec that signs with `secret` and trusts its own public key.
    #[must_use]
    pub fn new(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let trusted = vec![signing_key.verifying_key()];
        Self {
            signing_key,
            trusted,
        }
    }

    /// Additionally trusts blobs signed by an issuer's public key.
    pub fn with_trusted_issuer(mut self, public_key: &[u8; 32]) -> LicenseResult<Self> {
        let key = VerifyingKey::from_bytes(public_key)
            .map_err(|_| LicenseError::InvalidFormat("invalid issuer public key".to_string()))?;
        self.trusted.push(key);
        Ok(self)
    }

    /// Returns this codec's own public key.
    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }
}

impl fmt::Debug for SignedEnvelopeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedEnvelopeCodec")
            .field("signing_key", &"[REDACTED]")
            .field("trusted_keys", &self.trusted.len())
            .finish()
    }
}

impl LicenseCodec for SignedEnvelopeCodec {
    fn encode(&self, record: &LicenseRecord) -> LicenseResult<Vec<u8>> {
        let payload_b64 = URL_SAFE_NO_PAD.encode(record.to_json_bytes()?);
        let signature = self.signing_key.sign(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
        Ok(format!("{payload_b64}.{sig_b64}").into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> LicenseResult<LicenseRecord> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| LicenseError::InvalidFormat("license is not UTF-8".to_string()))?
            .trim();

        let Some((payload_b64, signature_b64)) = text.split_once('.') else {
            return Err(LicenseError::InvalidFormat(
                "license must have exactly two parts separated by a dot".to_string(),
            ));
        };
        if signature_b64.contains('.') {
            return Err(LicenseError::InvalidFormat(
                "license must have exactly two parts separated by a dot".to_string(),
            ));
        }

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| LicenseError::InvalidFormat(format!("invalid signature base64: {e}")))?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|_| LicenseError::InvalidFormat("invalid signature length".to_string()))?;

        let verified = self
            .trusted
            .iter()
            .any(|key| key.verify(payload_b64.as_bytes(), &signature).is_ok());
        if !verified {
            return Err(LicenseError::InvalidSignature);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| LicenseError::InvalidFormat(format!("invalid payload base64: {e}")))?;
        Ok(LicenseRecord::from_json_bytes(&payload)?)
    }
}
