//! Configuration module for the gateway push system.
//!
//! This module handles all configuration-related functionality:
//! - Parsing the declarative gateway document and the custom-entity overlay
//! - Validation of references, names and route matchers
//! - Computing content fingerprints for change detection
//! - Rendering the Direct-Apply wire document
//! - Environment-driven mirror settings

mod hash;
mod merge;
mod parser;
mod settings;
mod spec;
mod validator;

pub use hash::{FINGERPRINT_LEN, Fingerprint, FingerprintEngine, canonical_bytes};
pub use merge::{clean_plugin_nulls, merge_additive, parse_overlay, render_direct_body};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, ENV_SELECT_TAGS, find_config_file};
pub use settings::{
    DEFAULT_MIRROR_ADDRESS, ENV_MIRROR_ADDRESS, ENV_MIRROR_ENABLED, ENV_MIRROR_GROUP,
    ENV_MIRROR_TOKEN, MirrorSettings,
};
pub use spec::{
    CaCertificateConfig, ConfigInfo, ConsumerConfig, DEFAULT_FORMAT_VERSION,
    DesiredConfiguration, GatewayConfig, PluginConfig, RouteConfig, ServiceConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
