//! Delivery of a desired snapshot to one runtime target.
//!
//! A target either accepts a whole declarative document in one request
//! (Direct-Apply, DB-less proxies) or is driven entity by entity from a
//! computed plan (Reconciled-Apply).

pub mod direct;
pub mod reconciled;

use semver::Version;
use serde::Serialize;
use tracing::{debug, info};

use crate::admin::AdminClient;
use crate::config::DesiredConfiguration;
use crate::error::{ConfigError, Result, ResultExt};
use crate::sync::DEFAULT_CONCURRENCY;

/// How a target accepts configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    /// The whole document is posted in one request.
    DirectApply,
    /// Entities are created, updated and deleted individually.
    ReconciledApply,
}

impl TargetMode {
    /// Returns the delivery protocol used for this mode.
    #[must_use]
    pub const fn protocol(self) -> DeliveryProtocol {
        match self {
            Self::DirectApply => DeliveryProtocol::Direct,
            Self::ReconciledApply => DeliveryProtocol::Reconciled,
        }
    }
}

/// Delivery protocol label used in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryProtocol {
    /// Direct-Apply.
    Direct,
    /// Reconciled-Apply.
    Reconciled,
}

impl DeliveryProtocol {
    /// Returns the telemetry label value.
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Reconciled => "reconciled",
        }
    }
}

impl std::fmt::Display for DeliveryProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// A runtime target: one admin endpoint plus what is known about it.
#[derive(Debug, Clone)]
pub struct RuntimeTarget {
    /// Admin client.
    pub client: AdminClient,
    /// Delivery mode.
    pub mode: TargetMode,
    /// Maximum in-flight operations for Reconciled-Apply.
    pub concurrency: usize,
    /// Proxy version.
    pub version: Version,
    /// Leave CA certificates unmanaged.
    pub skip_ca_certificates: bool,
}

impl RuntimeTarget {
    /// Creates a target with known properties.
    #[must_use]
    pub fn new(client: AdminClient, mode: TargetMode, version: Version) -> Self {
        Self {
            client,
            mode,
            concurrency: DEFAULT_CONCURRENCY,
            version,
            skip_ca_certificates: false,
        }
    }

    /// Sets the concurrency budget.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets whether CA certificates are left unmanaged.
    #[must_use]
    pub const fn with_skip_ca_certificates(mut self, skip: bool) -> Self {
        self.skip_ca_certificates = skip;
        self
    }

    /// Discovers mode and version from the target's root endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the root endpoint cannot be read or reports an
    /// unparseable version.
    pub async fn discover(client: AdminClient) -> Result<Self> {
        let root = client
            .root()
            .await
            .context(format!("discovering {}", client.base_url()))?;
        let version = parse_proxy_version(&root.version)?;
        let mode = if root.is_dbless() {
            TargetMode::DirectApply
        } else {
            TargetMode::ReconciledApply
        };

        info!(
            "Discovered {} (version {version}, database '{}', {:?})",
            client.base_url(),
            root.configuration.database,
            mode
        );
        Ok(Self::new(client, mode, version))
    }

    /// Returns the delivery protocol of this target.
    #[must_use]
    pub const fn protocol(&self) -> DeliveryProtocol {
        self.mode.protocol()
    }
}

/// Parses a proxy version leniently: extra numeric components and build
/// suffixes are ignored (`3.4.1.0-enterprise` → `3.4.1`).
///
/// # Errors
///
/// Returns an error if no major version can be read.
pub fn parse_proxy_version(raw: &str) -> std::result::Result<Version, ConfigError> {
    let invalid = || ConfigError::InvalidVersion {
        version: raw.to_string(),
    };

    let core = raw
        .trim()
        .trim_start_matches('v')
        .split(['-', '+', ' '])
        .next()
        .unwrap_or_default();
    let mut parts = core.split('.').map(str::parse::<u64>);

    let major = parts.next().ok_or_else(invalid)?.map_err(|_| invalid())?;
    let minor = parts.next().transpose().map_err(|_| invalid())?.unwrap_or(0);
    let patch = parts.next().transpose().map_err(|_| invalid())?.unwrap_or(0);

    Ok(Version::new(major, minor, patch))
}

/// Delivers `desired` to `target` with the strategy its mode calls for.
///
/// # Errors
///
/// Returns the delivery failure, unclassified.
pub async fn deliver(target: &RuntimeTarget, desired: &DesiredConfiguration) -> Result<()> {
    debug!(
        "Delivering configuration to {} via {}",
        target.client.base_url(),
        target.protocol()
    );
    match target.mode {
        TargetMode::DirectApply => direct::apply(&target.client, desired).await,
        TargetMode::ReconciledApply => {
            reconciled::apply(&target.client, desired, &reconciled::ReconcileOptions::from(target))
                .await
                .map(|_| ())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_proxy_version() {
        assert_eq!(
            parse_proxy_version("3.4.1.0-enterprise").expect("version"),
            Version::new(3, 4, 1)
        );
        assert_eq!(parse_proxy_version("2.8").expect("version"), Version::new(2, 8, 0));
        assert_eq!(parse_proxy_version("v3").expect("version"), Version::new(3, 0, 0));
        assert!(parse_proxy_version("").is_err());
        assert!(parse_proxy_version("next").is_err());
    }

    #[test]
    fn test_protocol_labels() {
        assert_eq!(TargetMode::DirectApply.protocol().as_label(), "direct");
        assert_eq!(TargetMode::ReconciledApply.protocol().to_string(), "reconciled");
    }

    #[tokio::test]
    async fn test_discover_mode_from_database() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": "3.4.1.0-enterprise",
                "configuration": {"database": "postgres"}
            })))
            .mount(&server)
            .await;

        let client = AdminClient::new(server.uri()).expect("client");
        let target = RuntimeTarget::discover(client).await.expect("discover");

        assert_eq!(target.mode, TargetMode::ReconciledApply);
        assert_eq!(target.version, Version::new(3, 4, 1));
        assert_eq!(target.concurrency, DEFAULT_CONCURRENCY);
    }
}
