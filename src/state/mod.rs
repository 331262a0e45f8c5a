//! Persistence of the last applied fingerprint.
//!
//! The orchestrator itself is stateless across runs: callers keep the
//! fingerprint of the last successful push and hand it back on the next
//! one. This module stores it between process runs.

mod local;
mod store;
mod types;

pub use local::{LocalFingerprintStore, STATE_DIR, STATE_FILE};
pub use store::FingerprintStore;
pub use types::{FingerprintRecord, STATE_VERSION};
