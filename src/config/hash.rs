//! Content fingerprints for change detection.
//!
//! A fingerprint is the SHA-256 digest of the canonical JSON form of the core
//! document followed by the raw overlay bytes. Both parts are length-prefixed
//! so bytes cannot migrate across the boundary without changing the digest.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{PushError, Result};

use super::spec::{DesiredConfiguration, GatewayConfig};

/// Fingerprint length in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// A fixed-size content fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Sentinel meaning "no configuration applied yet".
    pub const UNSET: Self = Self([0; FINGERPRINT_LEN]);

    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Returns true for the "nothing applied yet" sentinel.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    /// Returns the lowercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid hex of the right length.
    pub fn from_hex(input: &str) -> Result<Self> {
        let bytes = hex::decode(input.trim())
            .map_err(|e| PushError::Serialization(format!("invalid fingerprint hex: {e}")))?;
        let bytes: [u8; FINGERPRINT_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            PushError::Serialization(format!(
                "fingerprint must be {FINGERPRINT_LEN} bytes, got {}",
                b.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Returns the first 8 hex characters, for display.
    #[must_use]
    pub fn short(&self) -> String {
        self.to_hex().chars().take(8).collect()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Computes fingerprints of desired configuration snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct FingerprintEngine;

impl FingerprintEngine {
    /// Creates a new fingerprint engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Fingerprints a desired configuration snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the core document cannot be serialized.
    pub fn fingerprint(&self, desired: &DesiredConfiguration) -> Result<Fingerprint> {
        self.fingerprint_parts(&desired.core, desired.overlay_bytes())
    }

    /// Fingerprints a core document and raw overlay bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the core document cannot be serialized.
    pub fn fingerprint_parts(&self, core: &GatewayConfig, overlay: &[u8]) -> Result<Fingerprint> {
        let core_bytes = canonical_bytes(core)?;

        let mut hasher = Sha256::new();
        hasher.update((core_bytes.len() as u64).to_be_bytes());
        hasher.update(&core_bytes);
        hasher.update((overlay.len() as u64).to_be_bytes());
        hasher.update(overlay);

        Ok(Fingerprint(hasher.finalize().into()))
    }
}

/// Serializes the core document to its canonical byte form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn canonical_bytes(core: &GatewayConfig) -> Result<Vec<u8>> {
    serde_json::to_vec(core)
        .map_err(|e| PushError::Serialization(format!("marshaling configuration: {e}")))
}
