//! Desired configuration document types.
//!
//! These structs map to the declarative gateway configuration file. The core
//! document is serialized canonically for fingerprinting and for the
//! Direct-Apply wire form; the optional overlay is kept as raw bytes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Format version written when the document does not declare one.
pub const DEFAULT_FORMAT_VERSION: &str = "3.0";

/// A desired configuration snapshot: the core document plus an optional
/// overlay of custom entities.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredConfiguration {
    /// The core configuration document.
    pub core: GatewayConfig,
    /// Raw JSON document of custom entities, merged additively.
    pub overlay: Option<Vec<u8>>,
}

/// The root of a declarative gateway configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// Document format version.
    #[serde(rename = "_format_version", default = "default_format_version")]
    pub format_version: String,
    /// Descriptive metadata, not accepted by the Direct-Apply endpoint.
    #[serde(rename = "_info", default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ConfigInfo>,
    /// Upstream services.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceConfig>,
    /// Routes exposing services.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
    /// API consumers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumers: Vec<ConsumerConfig>,
    /// Plugins, global or scoped to a service, route or consumer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginConfig>,
    /// Trusted CA certificates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ca_certificates: Vec<CaCertificateConfig>,
}

/// Descriptive document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigInfo {
    /// Tags marking the entities this document owns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select_tags: Vec<String>,
    /// Free-form defaults, kept for tooling.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub defaults: Map<String, Value>,
}

/// An upstream service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Unique service name.
    pub name: String,
    /// Shorthand for protocol, host, port and path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Upstream protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Upstream host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Upstream port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Upstream path prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Retries on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Connect timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,
    /// Read timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout: Option<u64>,
    /// Write timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_timeout: Option<u64>,
    /// Whether the service is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A route matching requests to a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Unique route name.
    pub name: String,
    /// Name of the service this route forwards to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Path prefixes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    /// Host names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// HTTP methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    /// Accepted protocols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
    /// Whether the matched path prefix is stripped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_path: Option<bool>,
    /// Whether the client Host header is forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_host: Option<bool>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// An API consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Unique username.
    pub username: String,
    /// Optional external identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A plugin instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginConfig {
    /// Plugin name.
    pub name: String,
    /// Service scope, by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Route scope, by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Consumer scope, by username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
    /// Plugin-specific configuration.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    /// Whether the plugin is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Dynamic plugin ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering: Option<Value>,
    /// Protocols the plugin runs on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A trusted CA certificate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaCertificateConfig {
    /// PEM-encoded certificate.
    pub cert: String,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

fn default_format_version() -> String {
    String::from(DEFAULT_FORMAT_VERSION)
}

impl DesiredConfiguration {
    /// Creates a snapshot without an overlay.
    #[must_use]
    pub const fn new(core: GatewayConfig) -> Self {
        Self {
            core,
            overlay: None,
        }
    }

    /// Attaches a raw custom-entity overlay.
    #[must_use]
    pub fn with_overlay(mut self, overlay: impl Into<Vec<u8>>) -> Self {
        let overlay = overlay.into();
        self.overlay = if overlay.is_empty() { None } else { Some(overlay) };
        self
    }

    /// Returns the overlay bytes, or an empty slice.
    #[must_use]
    pub fn overlay_bytes(&self) -> &[u8] {
        self.overlay.as_deref().unwrap_or_default()
    }
}

impl GatewayConfig {
    /// Creates an empty document.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            format_version: default_format_version(),
            info: None,
            services: vec![],
            routes: vec![],
            consumers: vec![],
            plugins: vec![],
            ca_certificates: vec![],
        }
    }

    /// Returns the select tags declared in `_info`.
    #[must_use]
    pub fn select_tags(&self) -> &[String] {
        self.info
            .as_ref()
            .map_or(&[][..], |info| info.select_tags.as_slice())
    }

    /// Returns the total number of entities in the document.
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.services.len()
            + self.routes.len()
            + self.consumers.len()
            + self.plugins.len()
            + self.ca_certificates.len()
    }
}

impl ServiceConfig {
    /// Creates a service pointing at `url`.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            protocol: None,
            host: None,
            port: None,
            path: None,
            retries: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            enabled: None,
            tags: vec![],
        }
    }
}

impl RouteConfig {
    /// Creates a route forwarding `paths` to `service`.
    #[must_use]
    pub fn new(name: impl Into<String>, service: impl Into<String>, paths: &[&str]) -> Self {
        Self {
            name: name.into(),
            service: Some(service.into()),
            paths: paths.iter().map(|p| (*p).to_string()).collect(),
            hosts: vec![],
            methods: vec![],
            protocols: vec![],
            strip_path: None,
            preserve_host: None,
            tags: vec![],
        }
    }
}

impl PluginConfig {
    /// Creates a global plugin with the given configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, config: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            service: None,
            route: None,
            consumer: None,
            config,
            enabled: None,
            ordering: None,
            protocols: vec![],
            tags: vec![],
        }
    }

    /// Returns a label describing the plugin and its scope.
    #[must_use]
    pub fn scope_label(&self) -> String {
        let mut label = self.name.clone();
        for (kind, target) in [
            ("service", &self.service),
            ("route", &self.route),
            ("consumer", &self.consumer),
        ] {
            if let Some(target) = target {
                label.push_str(&format!(" {kind}={target}"));
            }
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let yaml = r"
services:
  - name: billing
    url: http://billing.internal:8080
routes:
  - name: billing-api
    service: billing
    paths: [/billing]
";
        let config: GatewayConfig = serde_yaml::from_str(yaml).expect("parse");

        assert_eq!(config.format_version, DEFAULT_FORMAT_VERSION);
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.routes[0].service.as_deref(), Some("billing"));
        assert_eq!(config.entity_count(), 2);
        assert!(config.select_tags().is_empty());
    }

    #[test]
    fn test_empty_sections_are_not_serialized() {
        let mut config = GatewayConfig::empty();
        config.services.push(ServiceConfig::new("billing", "http://billing:8080"));

        let json = serde_json::to_value(&config).expect("serialize");
        let object = json.as_object().expect("object");

        assert!(object.contains_key("_format_version"));
        assert!(object.contains_key("services"));
        assert!(!object.contains_key("routes"));
        assert!(!object.contains_key("_info"));
    }

    #[test]
    fn test_empty_overlay_is_dropped() {
        let desired = DesiredConfiguration::new(GatewayConfig::empty()).with_overlay(Vec::new());
        assert!(desired.overlay.is_none());
        assert!(desired.overlay_bytes().is_empty());
    }

    #[test]
    fn test_plugin_scope_label() {
        let mut plugin = PluginConfig::new("rate-limiting", Map::new());
        plugin.route = Some(String::from("billing-api"));
        assert_eq!(plugin.scope_label(), "rate-limiting route=billing-api");
    }
}
