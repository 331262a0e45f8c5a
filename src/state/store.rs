//! Fingerprint store trait definition.

use async_trait::async_trait;

use super::types::FingerprintRecord;
use crate::error::Result;

/// Trait for fingerprint storage backends.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Loads the stored record.
    ///
    /// Returns `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<FingerprintRecord>>;

    /// Saves a record, replacing any previous one.
    async fn save(&self, record: &FingerprintRecord) -> Result<()>;

    /// Removes the stored record.
    async fn clear(&self) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl FingerprintStore for Box<dyn FingerprintStore> {
    async fn load(&self) -> Result<Option<FingerprintRecord>> {
        (**self).load().await
    }

    async fn save(&self, record: &FingerprintRecord) -> Result<()> {
        (**self).save(record).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
