//! Loading desired configuration documents and overlays.
//!
//! Documents are read as YAML (which also accepts JSON). The custom-entity
//! overlay is read as raw bytes and only interpreted at Direct-Apply time.

use crate::error::{ConfigError, PushError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{ConfigInfo, DesiredConfiguration, GatewayConfig};

/// Overrides the document's select tags (comma separated).
pub const ENV_SELECT_TAGS: &str = "GWPUSH_SELECT_TAGS";

/// Configuration parser for loading desired configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Loads a configuration document from a YAML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<GatewayConfig> {
        let path = self.resolve(path.as_ref());
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(PushError::Config(ConfigError::FileNotFound { path }));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            ConfigError::parse(
                format!("Failed to read file: {e}"),
                Some(path.display().to_string()),
            )
        })?;

        self.parse_yaml(&content, Some(&path))
    }

    /// Parses a configuration document from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<GatewayConfig> {
        debug!("Parsing configuration document");

        let config: GatewayConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConfigError::parse(format!("YAML parse error: {e}"), location)
        })?;

        debug!(
            "Parsed configuration with {} entities (format {})",
            config.entity_count(),
            config.format_version
        );
        Ok(config)
    }

    /// Reads a custom-entity overlay file as raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be read.
    pub fn load_overlay(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = self.resolve(path.as_ref());
        if !path.exists() {
            return Err(PushError::Config(ConfigError::FileNotFound { path }));
        }

        debug!("Loading custom entities from: {}", path.display());
        Ok(std::fs::read(&path)?)
    }

    /// Loads a complete desired snapshot, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read, or the document
    /// cannot be parsed.
    pub fn load_desired(
        &self,
        config_path: impl AsRef<Path>,
        overlay_path: Option<&Path>,
    ) -> Result<DesiredConfiguration> {
        let mut core = self.load_file(config_path)?;
        Self::apply_env_overrides(&mut core, |name| std::env::var(name).ok());

        let mut desired = DesiredConfiguration::new(core);
        if let Some(overlay_path) = overlay_path {
            desired = desired.with_overlay(self.load_overlay(overlay_path)?);
        }
        Ok(desired)
    }

    /// Applies environment overrides to the document.
    fn apply_env_overrides(config: &mut GatewayConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(tags) = lookup(ENV_SELECT_TAGS) {
            debug!("Overriding _info.select_tags from environment");
            let tags: Vec<String> = tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            config.info.get_or_insert_with(ConfigInfo::default).select_tags = tags;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConfigError::parse(
                    format!("Failed to load .env file: {e}"),
                    Some(env_path.display().to_string()),
                )
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "gateway.yaml",
    "gateway.yml",
    "gateway.json",
    "kong.yaml",
];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(PushError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
_format_version: "3.0"
_info:
  select_tags: [edge]
services:
  - name: billing
    url: http://billing.internal:8080
    retries: 3
    tags: [edge]
routes:
  - name: billing-api
    service: billing
    paths: [/billing]
    strip_path: true
consumers:
  - username: mobile-app
plugins:
  - name: rate-limiting
    route: billing-api
    config:
      minute: 20
      policy: local
      hour: null
ca_certificates:
  - cert: |
      -----BEGIN CERTIFICATE-----
      MIIB
      -----END CERTIFICATE-----
"#;
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).expect("parse");

        assert_eq!(config.select_tags(), &[String::from("edge")]);
        assert_eq!(config.services[0].retries, Some(3));
        assert_eq!(config.routes[0].strip_path, Some(true));
        assert_eq!(config.plugins[0].config["minute"], 20);
        assert!(config.plugins[0].config["hour"].is_null());
        assert_eq!(config.entity_count(), 5);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let parser = ConfigParser::new();
        let err = parser.parse_yaml("services: {not: [a list", None).unwrap_err();
        assert!(matches!(err, PushError::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_desired_with_overlay() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(
            dir.path().join("gateway.yaml"),
            "services:\n  - name: billing\n    url: http://billing:8080\n",
        )
        .expect("write config");
        std::fs::write(dir.path().join("custom.json"), br#"{"vaults": []}"#).expect("write overlay");

        let parser = ConfigParser::new().with_base_path(dir.path());
        let desired = parser
            .load_desired("gateway.yaml", Some(Path::new("custom.json")))
            .expect("load");

        assert_eq!(desired.core.services.len(), 1);
        assert_eq!(desired.overlay_bytes(), br#"{"vaults": []}"#);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().expect("temp dir");
        let parser = ConfigParser::new().with_base_path(dir.path());
        let err = parser.load_file("absent.yaml").unwrap_err();
        assert!(matches!(err, PushError::Config(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_select_tag_override() {
        let mut config = GatewayConfig::empty();
        ConfigParser::apply_env_overrides(&mut config, |name| {
            (name == ENV_SELECT_TAGS).then(|| String::from("edge, team-a,,"))
        });
        assert_eq!(
            config.select_tags(),
            &[String::from("edge"), String::from("team-a")]
        );
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = TempDir::new().expect("temp dir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join("gateway.yaml"), "{}").expect("write");

        let found = find_config_file(&nested).expect("found");
        assert_eq!(found, dir.path().join("gateway.yaml"));
    }
}
