//! Admin API data types.
//!
//! Entities travel as untyped JSON objects; only the fields the sync engine
//! needs (ids, natural keys, references) are interpreted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Configuration hash reported before any configuration has been applied.
pub const UNSET_CONFIGURATION_HASH: &str = "00000000000000000000000000000000";

/// Database mode reported by DB-less proxies.
pub const DBLESS_DATABASE: &str = "off";

/// Response of `GET /status`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Status {
    /// Hash of the configuration currently loaded by the proxy.
    #[serde(default)]
    pub configuration_hash: Option<String>,
}

impl Status {
    /// Returns true once the proxy reports a loaded configuration.
    #[must_use]
    pub fn has_configuration(&self) -> bool {
        self.configuration_hash
            .as_deref()
            .is_some_and(|hash| !hash.is_empty() && hash != UNSET_CONFIGURATION_HASH)
    }
}

/// Response of `GET /`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RootInfo {
    /// Proxy version string as reported, e.g. `3.4.1.0-enterprise`.
    pub version: String,
    /// Subset of the proxy configuration.
    #[serde(default)]
    pub configuration: RootConfiguration,
}

/// Configuration section of the root response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RootConfiguration {
    /// Database mode (`off` for DB-less).
    #[serde(default)]
    pub database: String,
}

impl RootInfo {
    /// Returns true if the proxy runs without a database.
    #[must_use]
    pub fn is_dbless(&self) -> bool {
        self.configuration.database == DBLESS_DATABASE
    }
}

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct Page {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Entity kinds managed by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Trusted CA certificates.
    CaCertificates,
    /// Upstream services.
    Services,
    /// API consumers.
    Consumers,
    /// Routes.
    Routes,
    /// Plugins.
    Plugins,
}

impl EntityKind {
    /// Every kind, in dependency order (referenced kinds first).
    pub const ALL: [Self; 5] = [
        Self::CaCertificates,
        Self::Services,
        Self::Consumers,
        Self::Routes,
        Self::Plugins,
    ];

    /// Returns the collection path segment.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::CaCertificates => "ca_certificates",
            Self::Services => "services",
            Self::Consumers => "consumers",
            Self::Routes => "routes",
            Self::Plugins => "plugins",
        }
    }

    /// Returns the singular, human-readable name.
    #[must_use]
    pub const fn singular(self) -> &'static str {
        match self {
            Self::CaCertificates => "ca_certificate",
            Self::Services => "service",
            Self::Consumers => "consumer",
            Self::Routes => "route",
            Self::Plugins => "plugin",
        }
    }

    /// Derives the natural key identifying an entity of this kind across
    /// live and desired state.
    ///
    /// Plugins are keyed by name plus the ids of their scope, so references
    /// must already be resolved to `{"id": ...}` objects.
    #[must_use]
    pub fn natural_key(self, body: &Map<String, Value>) -> Option<String> {
        match self {
            Self::Services | Self::Routes => str_field(body, "name").map(String::from),
            Self::Consumers => str_field(body, "username")
                .or_else(|| str_field(body, "custom_id"))
                .map(String::from),
            Self::CaCertificates => str_field(body, "cert").map(cert_digest),
            Self::Plugins => {
                let mut key = str_field(body, "name")?.to_string();
                for scope in ["service", "route", "consumer"] {
                    if let Some(id) = reference_id(body, scope) {
                        key.push_str(&format!(" {scope}={id}"));
                    }
                }
                Some(key)
            }
        }
    }

    /// Optional fields only ever set by the pushed document.
    ///
    /// The admin API never fills these in, so a live value the desired
    /// entity no longer carries is a removal, not a default.
    #[must_use]
    pub const fn owned_fields(self) -> &'static [&'static str] {
        match self {
            Self::CaCertificates => &["tags"],
            Self::Services => &["path", "client_certificate", "ca_certificates", "tags"],
            Self::Consumers => &["username", "custom_id", "tags"],
            Self::Routes => &[
                "paths",
                "hosts",
                "methods",
                "headers",
                "snis",
                "sources",
                "destinations",
                "service",
                "tags",
            ],
            Self::Plugins => &["service", "route", "consumer", "tags"],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.singular())
    }
}

/// A single entity, either live or desired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    /// Entity id.
    pub id: String,
    /// Natural key.
    pub key: String,
    /// Full entity body, including `id`.
    pub body: Map<String, Value>,
}

/// Returns the SHA-256 hex digest of a PEM certificate, ignoring surrounding
/// whitespace.
#[must_use]
pub fn cert_digest(cert: &str) -> String {
    hex::encode(Sha256::digest(cert.trim().as_bytes()))
}

/// Returns the id of a reference field (`{"id": "..."}`), if set.
#[must_use]
pub fn reference_id<'a>(body: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    body.get(field)?.get("id")?.as_str()
}

fn str_field<'a>(body: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    body.get(field)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn test_status_unset_hash() {
        let unset: Status =
            serde_json::from_value(json!({"configuration_hash": UNSET_CONFIGURATION_HASH}))
                .expect("status");
        let loaded: Status =
            serde_json::from_value(json!({"configuration_hash": "5f2b..."})).expect("status");
        let missing: Status = serde_json::from_value(json!({"server": {}})).expect("status");

        assert!(!unset.has_configuration());
        assert!(loaded.has_configuration());
        assert!(!missing.has_configuration());
    }

    #[test]
    fn test_root_info_dbless() {
        let root: RootInfo = serde_json::from_value(json!({
            "version": "3.4.1",
            "configuration": {"database": "off", "role": "traditional"}
        }))
        .expect("root");
        assert!(root.is_dbless());

        let root: RootInfo =
            serde_json::from_value(json!({"version": "2.8.0", "configuration": {"database": "postgres"}}))
                .expect("root");
        assert!(!root.is_dbless());
    }

    #[test]
    fn test_natural_keys() {
        let service = object(json!({"id": "1", "name": "billing"}));
        let consumer = object(json!({"id": "2", "custom_id": "ext-7"}));
        let plugin = object(json!({
            "name": "key-auth",
            "route": {"id": "r1"},
            "service": null
        }));

        assert_eq!(EntityKind::Services.natural_key(&service).as_deref(), Some("billing"));
        assert_eq!(EntityKind::Consumers.natural_key(&consumer).as_deref(), Some("ext-7"));
        assert_eq!(
            EntityKind::Plugins.natural_key(&plugin).as_deref(),
            Some("key-auth route=r1")
        );
        assert_eq!(EntityKind::Routes.natural_key(&object(json!({"id": "3"}))), None);
    }

    #[test]
    fn test_cert_digest_ignores_whitespace() {
        assert_eq!(cert_digest("PEM\n"), cert_digest("  PEM"));
        assert_eq!(cert_digest("PEM").len(), 64);
    }
}
