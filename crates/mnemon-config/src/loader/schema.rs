//! Schema validation helpers for mnemon JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = ["$schema", "store", "consolidation", "snapshot"];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("store") {
        validate_store(value, layer, "store")?;
    }
    if let Some(value) = map.get("consolidation") {
        validate_consolidation(value, layer, "consolidation")?;
    }
    if let Some(value) = map.get("snapshot") {
        validate_snapshot(value, layer, "snapshot")?;
    }

    Ok(())
}

/// Validate the "store" block.
fn validate_store(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "dimension",
            "capacity",
            "backend",
            "similarity_threshold",
            "compaction_threshold",
            "exact_threads",
        ],
        layer,
        path,
    )?;

    if let Some(value) = map.get("dimension") {
        expect_u64(value, layer, &join_path(path, "dimension"))?;
    }
    if let Some(value) = map.get("capacity") {
        expect_u64(value, layer, &join_path(path, "capacity"))?;
    }
    if let Some(value) = map.get("backend") {
        validate_backend(value, layer, &join_path(path, "backend"))?;
    }
    if let Some(value) = map.get("similarity_threshold") {
        expect_optional(value, layer, &join_path(path, "similarity_threshold"), expect_f64)?;
    }
    if let Some(value) = map.get("compaction_threshold") {
        expect_f64(value, layer, &join_path(path, "compaction_threshold"))?;
    }
    if let Some(value) = map.get("exact_threads") {
        expect_optional(value, layer, &join_path(path, "exact_threads"), expect_u64)?;
    }
    Ok(())
}

/// Validate the backend selector.
fn validate_backend(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let Some(backend) = value.as_str() else {
        return Err(invalid_field(layer, path, "expected string"));
    };
    if matches!(backend, "exact" | "fallback" | "auto") {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "invalid backend"))
    }
}

/// Validate the "consolidation" block.
fn validate_consolidation(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "weights",
            "recency_half_life_secs",
            "frequency_saturation",
            "outcome_key",
            "redundancy_threshold",
            "redundancy_probe",
            "schedule",
        ],
        layer,
        path,
    )?;

    if let Some(value) = map.get("weights") {
        validate_weights(value, layer, &join_path(path, "weights"))?;
    }
    if let Some(value) = map.get("recency_half_life_secs") {
        expect_u64(value, layer, &join_path(path, "recency_half_life_secs"))?;
    }
    if let Some(value) = map.get("frequency_saturation") {
        expect_f64(value, layer, &join_path(path, "frequency_saturation"))?;
    }
    if let Some(value) = map.get("outcome_key") {
        expect_string(value, layer, &join_path(path, "outcome_key"))?;
    }
    if let Some(value) = map.get("redundancy_threshold") {
        expect_f64(value, layer, &join_path(path, "redundancy_threshold"))?;
    }
    if let Some(value) = map.get("redundancy_probe") {
        expect_u64(value, layer, &join_path(path, "redundancy_probe"))?;
    }
    if let Some(value) = map.get("schedule") {
        validate_schedule(value, layer, &join_path(path, "schedule"))?;
    }
    Ok(())
}

/// Validate importance weights.
fn validate_weights(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = ["recency", "frequency", "outcome", "redundancy"];
    ensure_allowed_keys(map, &allowed, layer, path)?;
    for key in allowed {
        if let Some(value) = map.get(key) {
            expect_f64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the consolidation schedule.
fn validate_schedule(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["enabled", "interval_secs"], layer, path)?;

    if let Some(value) = map.get("enabled") {
        expect_bool(value, layer, &join_path(path, "enabled"))?;
    }
    if let Some(value) = map.get("interval_secs") {
        expect_u64(value, layer, &join_path(path, "interval_secs"))?;
    }
    Ok(())
}

/// Validate the "snapshot" block.
fn validate_snapshot(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["path", "interval_secs", "load_on_start"], layer, path)?;

    if let Some(value) = map.get("path") {
        expect_optional(value, layer, &join_path(path, "path"), expect_string)?;
    }
    if let Some(value) = map.get("interval_secs") {
        expect_optional(value, layer, &join_path(path, "interval_secs"), expect_u64)?;
    }
    if let Some(value) = map.get("load_on_start") {
        expect_bool(value, layer, &join_path(path, "load_on_start"))?;
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Accept `null` or delegate to `check`.
fn expect_optional(
    value: &Value,
    layer: &str,
    path: &str,
    check: fn(&Value, &str, &str) -> Result<(), ConfigError>,
) -> Result<(), ConfigError> {
    if value.is_null() {
        Ok(())
    } else {
        check(value, layer, path)
    }
}

/// Expect a JSON string or return a typed error.
fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect a JSON boolean or return a typed error.
fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if matches!(value, Value::Bool(_)) {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a non-negative integer.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Expect a JSON number or return a typed error.
fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_f64() || value.is_u64() || value.is_i64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::field(format!("{layer}:{normalized_path}"), message)
}
