//! Environment-driven settings for secondary-target mirroring.

use tracing::debug;

use crate::error::{ConfigError, Result};

/// Enables mirroring to the secondary control plane.
pub const ENV_MIRROR_ENABLED: &str = "GWPUSH_MIRROR_ENABLED";
/// Base address of the secondary control plane.
pub const ENV_MIRROR_ADDRESS: &str = "GWPUSH_MIRROR_ADDRESS";
/// Logical group name to resolve on the secondary control plane.
pub const ENV_MIRROR_GROUP: &str = "GWPUSH_MIRROR_GROUP";
/// Bearer token for the secondary control plane.
pub const ENV_MIRROR_TOKEN: &str = "GWPUSH_MIRROR_TOKEN";

/// Default secondary control-plane address.
pub const DEFAULT_MIRROR_ADDRESS: &str = "https://api.konghq.com";

/// Secondary-target mirroring settings.
#[derive(Clone, PartialEq, Eq)]
pub struct MirrorSettings {
    /// Whether mirroring is enabled.
    pub enabled: bool,
    /// Base address of the secondary control plane.
    pub address: String,
    /// Logical group name.
    pub group_name: String,
    /// Bearer token; required once mirroring actually runs.
    pub token: Option<String>,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            address: String::from(DEFAULT_MIRROR_ADDRESS),
            group_name: String::new(),
            token: None,
        }
    }
}

impl std::fmt::Debug for MirrorSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorSettings")
            .field("enabled", &self.enabled)
            .field("address", &self.address)
            .field("group_name", &self.group_name)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl MirrorSettings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the enable flag is not a recognised boolean.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the enable flag is not a recognised boolean.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let enabled = match lookup(ENV_MIRROR_ENABLED) {
            Some(raw) => parse_bool(ENV_MIRROR_ENABLED, &raw)?,
            None => false,
        };

        let address = lookup(ENV_MIRROR_ADDRESS)
            .map(|a| a.trim().trim_end_matches('/').to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| String::from(DEFAULT_MIRROR_ADDRESS));

        let settings = Self {
            enabled,
            address,
            group_name: lookup(ENV_MIRROR_GROUP).unwrap_or_default(),
            token: lookup(ENV_MIRROR_TOKEN).filter(|t| !t.is_empty()),
        };
        debug!("Loaded mirror settings: {settings:?}");
        Ok(settings)
    }

    /// Returns the token, or the configuration error that makes mirroring
    /// impossible.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured.
    pub fn require_token(&self) -> std::result::Result<&str, ConfigError> {
        self.token.as_deref().ok_or_else(|| ConfigError::MissingEnvVar {
            name: String::from(ENV_MIRROR_TOKEN),
        })
    }
}

fn parse_bool(name: &str, raw: &str) -> std::result::Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}
