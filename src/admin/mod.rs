//! Admin API module.
//!
//! This module provides:
//! - HTTP client for a proxy admin API (and the secondary control plane)
//! - Runtime group directory lookup for the secondary control plane
//! - Wire types for status, root and entity payloads

mod client;
mod directory;
mod types;

pub use client::{AdminClient, DEFAULT_TIMEOUT_SECS};
pub use directory::{DirectoryClient, RUNTIME_GROUPS_PATH, RuntimeGroup};
pub use types::{
    DBLESS_DATABASE, Entity, EntityKind, RootConfiguration, RootInfo, Status,
    UNSET_CONFIGURATION_HASH, cert_digest, reference_id,
};
