//! Explicit codecs for values crossing the key-value boundary.
//!
//! Every value in the store is a string; these functions are the only place
//! where typed fields are turned into strings and back.

use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub fn encode_bool(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Decodes a stored flag. The capitalised spellings are accepted for records
/// written by older deployments.
pub fn decode_bool(raw: &str) -> Result<bool, RegistryError> {
    match raw {
        "true" | "True" => Ok(true),
        "false" | "False" => Ok(false),
        other => Err(RegistryError::StorageFailure(format!(
            "invalid stored boolean: {other:?}"
        ))),
    }
}

pub fn encode_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub fn decode_time(raw: &str) -> Result<DateTime<Utc>, RegistryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RegistryError::StorageFailure(format!("invalid stored timestamp {raw:?}: {e}")))
}

pub fn encode_list(values: &[String]) -> String {
    serde_json::Value::from(values.to_vec()).to_string()
}

pub fn decode_list(raw: &str) -> Result<Vec<String>, RegistryError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| RegistryError::StorageFailure(format!("invalid stored list {raw:?}: {e}")))
}

/// Reads a required field out of a stored hash
pub fn required<'a>(
    fields: &'a BTreeMap<String, String>,
    key: &str,
    name: &str,
) -> Result<&'a str, RegistryError> {
    fields.get(name).map(String::as_str).ok_or_else(|| {
        RegistryError::StorageFailure(format!("record {key} is missing field {name}"))
    })
}

/// Reads an optional field, treating empty strings as absent
pub fn optional(fields: &BTreeMap<String, String>, name: &str) -> Option<String> {
    fields.get(name).filter(|v| !v.is_empty()).cloned()
}
