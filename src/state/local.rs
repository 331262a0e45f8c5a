//! Local file-based fingerprint storage.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::store::FingerprintStore;
use super::types::FingerprintRecord;
use crate::error::{PushError, Result, StateError};

/// Default state directory name.
pub const STATE_DIR: &str = ".gwpush";

/// Default state file name.
pub const STATE_FILE: &str = "fingerprint.json";

/// Local file-based fingerprint store.
#[derive(Debug, Clone)]
pub struct LocalFingerprintStore {
    /// Directory holding the state file.
    base_dir: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
}

impl LocalFingerprintStore {
    /// Creates a store under `.gwpush/` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| PushError::internal(format!("Cannot determine current directory: {e}")))?
            .join(STATE_DIR);

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a store under the user's local data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no such directory.
    pub fn in_user_data_dir() -> Result<Self> {
        let base_dir = dirs::data_local_dir()
            .ok_or_else(|| PushError::internal("Cannot determine the local data directory"))?
            .join("gwpush");

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a store in a custom directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let state_path = base_dir.join(STATE_FILE);
        Self {
            base_dir,
            state_path,
        }
    }

    /// Creates a store from an explicit state file path.
    #[must_use]
    pub fn with_state_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let base_dir = state_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            base_dir,
            state_path,
        }
    }

    /// Returns the state file path.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                StateError::write_failed(format!("Failed to create state directory: {e}"))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl FingerprintStore for LocalFingerprintStore {
    async fn load(&self) -> Result<Option<FingerprintRecord>> {
        if !self.state_path.exists() {
            debug!("State file does not exist: {}", self.state_path.display());
            return Ok(None);
        }

        debug!("Loading fingerprint from: {}", self.state_path.display());

        let content = fs::read_to_string(&self.state_path)
            .await
            .map_err(|e| StateError::corrupted(format!("Failed to read state file: {e}")))?;

        let record = serde_json::from_str(&content)
            .map_err(|e| StateError::corrupted(format!("Failed to parse state file: {e}")))?;

        Ok(Some(record))
    }

    async fn save(&self, record: &FingerprintRecord) -> Result<()> {
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| PushError::Serialization(format!("Failed to serialize state: {e}")))?;

        // Write to a sibling temp file, then rename over the old one.
        let temp_path = self.state_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StateError::write_failed(format!("Failed to create temp file: {e}")))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StateError::write_failed(format!("Failed to write state file: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| StateError::write_failed(format!("Failed to sync state file: {e}")))?;

        fs::rename(&temp_path, &self.state_path)
            .await
            .map_err(|e| StateError::write_failed(format!("Failed to rename state file: {e}")))?;

        info!(
            "Saved fingerprint {} to {}",
            record.fingerprint.short(),
            self.state_path.display()
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.state_path.exists() {
            info!("Deleting state file: {}", self.state_path.display());
            fs::remove_file(&self.state_path)
                .await
                .map_err(|e| StateError::write_failed(format!("Failed to delete state file: {e}")))?;
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Fingerprint;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn create_test_store() -> (LocalFingerprintStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalFingerprintStore::with_base_dir(temp_dir.path().join(STATE_DIR));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _temp) = create_test_store();
        let record = FingerprintRecord::new(Fingerprint::from_bytes([9; 32]), "http://kong:8001");

        assert_ok!(store.save(&record).await);
        let loaded = store
            .load()
            .await
            .expect("Failed to load")
            .expect("Record should exist");

        assert_eq!(loaded, record);
        assert!(store.state_path().ends_with(".gwpush/fingerprint.json"));
        assert!(!store.state_path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _temp) = create_test_store();
        assert!(store.load().await.expect("Load should not fail").is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_previous() {
        let (store, _temp) = create_test_store();
        let first = FingerprintRecord::new(Fingerprint::from_bytes([1; 32]), "t");
        let second = FingerprintRecord::new(Fingerprint::from_bytes([2; 32]), "t");

        assert_ok!(store.save(&first).await);
        assert_ok!(store.save(&second).await);

        let loaded = store.load().await.expect("load").expect("record");
        assert_eq!(loaded.fingerprint, second.fingerprint);
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, _temp) = create_test_store();
        let record = FingerprintRecord::new(Fingerprint::from_bytes([3; 32]), "t");

        assert_ok!(store.save(&record).await);
        assert_ok!(store.clear().await);
        assert!(store.load().await.expect("load").is_none());
        assert_ok!(store.clear().await);
    }

    #[tokio::test]
    async fn test_corrupted_file() {
        let (store, _temp) = create_test_store();
        std::fs::create_dir_all(store.state_path().parent().expect("parent")).expect("mkdir");
        std::fs::write(store.state_path(), "{not json").expect("write");

        let err = assert_err!(store.load().await);
        assert!(matches!(err, PushError::State(StateError::Corrupted { .. })));
    }

    #[test]
    fn test_backend_type() {
        let store: Box<dyn FingerprintStore> =
            Box::new(LocalFingerprintStore::with_state_path("/tmp/x/fp.json"));
        assert_eq!(store.backend_type(), "local");
    }
}
