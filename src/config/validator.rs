//! Validation of desired configuration documents.
//!
//! Validation is a caller-side check (the `validate` and `plan` commands);
//! the push path itself does not reject documents here, so that rendering
//! failures keep their conflict classification.

use crate::error::{ConfigError, PushError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{GatewayConfig, PluginConfig, RouteConfig};

/// Format versions this tool understands.
const SUPPORTED_FORMAT_VERSIONS: &[&str] = &["1.1", "3.0"];

/// Validator for gateway configuration documents.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration document, collecting every problem.
    #[must_use]
    pub fn check(&self, config: &GatewayConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_format(config, &mut result);
        let services = Self::validate_services(config, &mut result);
        let routes = Self::validate_routes(&config.routes, &services, &mut result);
        let consumers = Self::validate_consumers(config, &mut result);
        Self::validate_plugins(&config.plugins, &services, &routes, &consumers, &mut result);
        Self::validate_select_tags(config, &mut result);

        result
    }

    /// Validates a configuration document.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &GatewayConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(PushError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )))
        }
    }

    fn validate_format(config: &GatewayConfig, result: &mut ValidationResult) {
        if !SUPPORTED_FORMAT_VERSIONS.contains(&config.format_version.as_str()) {
            result.errors.push(ValidationError {
                field: String::from("_format_version"),
                message: format!(
                    "Unsupported format version '{}' (expected one of {})",
                    config.format_version,
                    SUPPORTED_FORMAT_VERSIONS.join(", ")
                ),
            });
        }
    }

    fn validate_services<'a>(
        config: &'a GatewayConfig,
        result: &mut ValidationResult,
    ) -> HashSet<&'a str> {
        let mut names = HashSet::new();

        for (i, service) in config.services.iter().enumerate() {
            let prefix = format!("services[{i}]");

            if !names.insert(service.name.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Duplicate service name: {}", service.name),
                });
            }

            if !is_valid_name(&service.name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Service name '{}' is invalid", service.name),
                });
            }

            if service.url.is_none() && service.host.is_none() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.url"),
                    message: format!("Service '{}' needs either url or host", service.name),
                });
            }

            if service.url.is_some() && (service.host.is_some() || service.port.is_some()) {
                result.warnings.push(format!(
                    "{prefix}: url and host/port are both set; the admin API will reject this"
                ));
            }
        }

        names
    }

    fn validate_routes<'a>(
        routes: &'a [RouteConfig],
        services: &HashSet<&str>,
        result: &mut ValidationResult,
    ) -> HashSet<&'a str> {
        let mut names = HashSet::new();

        for (i, route) in routes.iter().enumerate() {
            let prefix = format!("routes[{i}]");

            if !names.insert(route.name.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Duplicate route name: {}", route.name),
                });
            }

            if let Some(service) = &route.service
                && !services.contains(service.as_str())
            {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.service"),
                    message: format!(
                        "Route '{}' references unknown service '{service}'",
                        route.name
                    ),
                });
            }

            if route.paths.is_empty() && route.hosts.is_empty() && route.methods.is_empty() {
                result.errors.push(ValidationError {
                    field: prefix.clone(),
                    message: format!(
                        "Route '{}' needs at least one of paths, hosts or methods",
                        route.name
                    ),
                });
            }

            for (j, path) in route.paths.iter().enumerate() {
                if !path.starts_with('/') && !path.starts_with('~') {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.paths[{j}]"),
                        message: format!("Path must start with '/' or '~': {path}"),
                    });
                }
            }
        }

        names
    }

    fn validate_consumers<'a>(
        config: &'a GatewayConfig,
        result: &mut ValidationResult,
    ) -> HashSet<&'a str> {
        let mut names = HashSet::new();
        for (i, consumer) in config.consumers.iter().enumerate() {
            if !names.insert(consumer.username.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("consumers[{i}].username"),
                    message: format!("Duplicate consumer username: {}", consumer.username),
                });
            }
        }
        names
    }

    fn validate_plugins(
        plugins: &[PluginConfig],
        services: &HashSet<&str>,
        routes: &HashSet<&str>,
        consumers: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        let mut scopes = HashSet::new();

        for (i, plugin) in plugins.iter().enumerate() {
            let prefix = format!("plugins[{i}]");

            for (field, target, known) in [
                ("service", &plugin.service, services),
                ("route", &plugin.route, routes),
                ("consumer", &plugin.consumer, consumers),
            ] {
                if let Some(target) = target
                    && !known.contains(target.as_str())
                {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.{field}"),
                        message: format!(
                            "Plugin '{}' references unknown {field} '{target}'",
                            plugin.name
                        ),
                    });
                }
            }

            if !scopes.insert(plugin.scope_label()) {
                result.errors.push(ValidationError {
                    field: prefix,
                    message: format!("Duplicate plugin: {}", plugin.scope_label()),
                });
            }
        }
    }

    fn validate_select_tags(config: &GatewayConfig, result: &mut ValidationResult) {
        let select_tags = config.select_tags();
        if select_tags.is_empty() {
            return;
        }

        let tagged = config
            .services
            .iter()
            .map(|s| (&s.name, &s.tags))
            .chain(config.routes.iter().map(|r| (&r.name, &r.tags)));
        for (name, tags) in tagged {
            if !tags.is_empty() && !select_tags.iter().all(|t| tags.contains(t)) {
                result.warnings.push(format!(
                    "'{name}' carries its own tags without the select tags; they will be added"
                ));
            }
        }
    }
}

/// Checks if a name is a valid entity name.
///
/// Valid names are non-empty and use only ASCII alphanumerics, `-`, `_`,
/// `.` and `~`.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::{ConsumerConfig, ServiceConfig};
    use serde_json::Map;

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig::empty();
        config
            .services
            .push(ServiceConfig::new("billing", "http://billing:8080"));
        config
            .routes
            .push(RouteConfig::new("billing-api", "billing", &["/billing"]));
        config.consumers.push(ConsumerConfig {
            username: String::from("mobile-app"),
            custom_id: None,
            tags: vec![],
        });
        let mut plugin = PluginConfig::new("key-auth", Map::new());
        plugin.route = Some(String::from("billing-api"));
        config.plugins.push(plugin);
        config
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("billing-api"));
        assert!(is_valid_name("billing_v2.internal"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("billing api"));
        assert!(!is_valid_name("billing/api"));
    }

    #[test]
    fn test_valid_config_passes() {
        let validator = ConfigValidator::new();
        let result = validator.validate(&valid_config()).expect("valid");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_dangling_references() {
        let mut config = valid_config();
        config.routes[0].service = Some(String::from("missing"));
        config.plugins[0].consumer = Some(String::from("ghost"));

        let result = ConfigValidator::new().check(&config);

        assert_eq!(result.error_count(), 2);
        assert_eq!(result.errors[0].field, "routes[0].service");
        assert_eq!(result.errors[1].field, "plugins[0].consumer");
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut config = valid_config();
        config.services.push(ServiceConfig::new("billing", "http://other:8080"));
        config.plugins.push(config.plugins[0].clone());

        let result = ConfigValidator::new().check(&config);
        let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();

        assert!(messages.contains(&"Duplicate service name: billing"));
        assert!(messages.contains(&"Duplicate plugin: key-auth route=billing-api"));
    }

    #[test]
    fn test_route_without_matchers() {
        let mut config = valid_config();
        config.routes[0].paths.clear();

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(matches!(
            err,
            PushError::Config(ConfigError::ValidationError { field: Some(ref f), .. }) if f == "routes[0]"
        ));
    }

    #[test]
    fn test_unsupported_format_version() {
        let mut config = valid_config();
        config.format_version = String::from("9.9");
        assert!(!ConfigValidator::new().check(&config).is_valid());
    }
}
