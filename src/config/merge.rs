//! Direct-Apply wire rendering.
//!
//! Turns a desired snapshot into the single JSON document the Direct-Apply
//! endpoint accepts: descriptive metadata is stripped, null values inside
//! plugin configuration are removed, and the custom-entity overlay is merged
//! in additively (an overlay key never replaces a core key).

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{PushError, Result};

use super::spec::{DesiredConfiguration, GatewayConfig};

/// Top-level key holding descriptive metadata.
const INFO_KEY: &str = "_info";

/// Merges `overlay` into `core`, keeping every key already present in `core`.
///
/// Returns the keys that were dropped because they collide with core keys.
pub fn merge_additive(core: &mut Map<String, Value>, overlay: Map<String, Value>) -> Vec<String> {
    let mut dropped = Vec::new();
    for (key, value) in overlay {
        if core.contains_key(&key) {
            dropped.push(key);
        } else {
            core.insert(key, value);
        }
    }
    dropped
}

/// Parses overlay bytes into a JSON object.
///
/// Malformed input is logged and treated as an empty overlay.
#[must_use]
pub fn parse_overlay(bytes: &[u8]) -> Map<String, Value> {
    if bytes.is_empty() {
        return Map::new();
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(
                "Ignoring custom entities: expected a JSON object, found {}",
                json_type_name(&other)
            );
            Map::new()
        }
        Err(e) => {
            warn!("Ignoring custom entities: failed to parse overlay: {e}");
            Map::new()
        }
    }
}

/// Removes null-valued keys from every plugin's `config`, recursively.
pub fn clean_plugin_nulls(core: &mut GatewayConfig) {
    for plugin in &mut core.plugins {
        strip_nulls(&mut plugin.config);
    }
}

fn strip_nulls(map: &mut Map<String, Value>) {
    map.retain(|_, value| !value.is_null());
    for value in map.values_mut() {
        match value {
            Value::Object(inner) => strip_nulls(inner),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        strip_nulls(inner);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Renders the Direct-Apply request body for `desired`.
///
/// # Errors
///
/// Returns an error if the core document cannot be serialized.
pub fn render_direct_body(desired: &DesiredConfiguration) -> Result<Vec<u8>> {
    let mut core = desired.core.clone();
    clean_plugin_nulls(&mut core);

    let mut document = match serde_json::to_value(&core) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(PushError::Serialization(String::from(
                "configuration did not serialize to an object",
            )));
        }
        Err(e) => {
            return Err(PushError::Serialization(format!(
                "marshaling configuration: {e}"
            )));
        }
    };
    document.remove(INFO_KEY);

    let dropped = merge_additive(&mut document, parse_overlay(desired.overlay_bytes()));
    if !dropped.is_empty() {
        debug!("Custom entities shadowed by core configuration: {}", dropped.join(", "));
    }

    serde_json::to_vec(&Value::Object(document))
        .map_err(|e| PushError::Serialization(format!("marshaling final configuration: {e}")))
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
