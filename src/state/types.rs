//! Persisted fingerprint record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Fingerprint;

/// Current version of the record format.
pub const STATE_VERSION: &str = "1.0";

/// The last fingerprint successfully applied to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Record format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Applied fingerprint, hex encoded.
    pub fingerprint: Fingerprint,
    /// Admin URL of the target.
    pub target: String,
    /// When the record was written.
    pub saved_at: DateTime<Utc>,
}

fn default_version() -> String {
    STATE_VERSION.to_string()
}

impl FingerprintRecord {
    /// Creates a record stamped now.
    #[must_use]
    pub fn new(fingerprint: Fingerprint, target: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            fingerprint,
            target: target.into(),
            saved_at: Utc::now(),
        }
    }

    /// Returns the fingerprint if this record belongs to `target`.
    #[must_use]
    pub fn fingerprint_for(&self, target: &str) -> Option<Fingerprint> {
        (self.target.trim_end_matches('/') == target.trim_end_matches('/'))
            .then_some(self.fingerprint)
    }
}
