//! Data-driven validation tables for inbound account and package documents.

use crate::error::RegistryError;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashSet;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Array,
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    /// Only meaningful for arrays
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unique_items: bool,
}

const fn text(name: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::String,
        required,
        unique_items: false,
    }
}

const fn unique_list(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type: FieldType::Array,
        required: false,
        unique_items: true,
    }
}

pub const ACCOUNT_SCHEMA: &[FieldSpec] = &[
    text("username", true),
    text("first_name", true),
    text("last_name", false),
    text("password", true),
    text("email", true),
    text("phone", false),
    text("city", false),
    text("state", false),
    text("country", false),
];

pub const PACKAGE_SCHEMA: &[FieldSpec] = &[
    text("username", true),
    text("name", true),
    text("description", true),
    text("long_description", false),
    text("version", true),
    unique_list("napp_dependencies"),
    text("license", true),
    text("url", false),
    text("readme", false),
    unique_list("tags"),
];

/// Looks up a schema by the name it is published under
pub fn schema_by_name(name: &str) -> Option<&'static [FieldSpec]> {
    match name {
        "account" => Some(ACCOUNT_SCHEMA),
        "package" => Some(PACKAGE_SCHEMA),
        _ => None,
    }
}

/// Renders a schema as a JSON document with its fields and required list
pub fn schema_document(schema: &[FieldSpec]) -> Value {
    let required: Vec<&str> = schema
        .iter()
        .filter(|field| field.required)
        .map(|field| field.name)
        .collect();

    json!({
        "fields": schema,
        "required": required,
    })
}

/// Checks `document` against `schema`. Unknown fields are ignored.
pub fn validate(schema: &[FieldSpec], document: &Value) -> Result<(), RegistryError> {
    let object = document
        .as_object()
        .ok_or_else(|| RegistryError::InvalidMetadata("Expected a JSON object".to_string()))?;

    for field in schema {
        check_field(field, object)?;
    }

    Ok(())
}

fn check_field(field: &FieldSpec, object: &Map<String, Value>) -> Result<(), RegistryError> {
    let value = match object.get(field.name) {
        None | Some(Value::Null) if field.required => {
            return Err(RegistryError::InvalidMetadata(format!(
                "Missing key {}",
                field.name
            )));
        }
        None | Some(Value::Null) => return Ok(()),
        Some(value) => value,
    };

    match field.field_type {
        FieldType::String => {
            let text = value.as_str().ok_or_else(|| {
                RegistryError::InvalidMetadata(format!("Field {} must be a string", field.name))
            })?;
            if field.required && text.trim().is_empty() {
                return Err(RegistryError::InvalidMetadata(format!(
                    "Field {} must not be empty",
                    field.name
                )));
            }
        }
        FieldType::Array => {
            let items = value.as_array().ok_or_else(|| {
                RegistryError::InvalidMetadata(format!("Field {} must be an array", field.name))
            })?;
            let mut seen = HashSet::new();
            for item in items {
                let item = item.as_str().ok_or_else(|| {
                    RegistryError::InvalidMetadata(format!(
                        "Field {} must only contain strings",
                        field.name
                    ))
                })?;
                if field.unique_items && !seen.insert(item) {
                    return Err(RegistryError::InvalidMetadata(format!(
                        "Field {} contains duplicate item {item}",
                        field.name
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Checks that an identifier is safe to embed in store keys and file names:
/// 1 to 64 characters from `[A-Za-z0-9_-]`.
pub fn validate_identifier(field: &str, value: &str) -> Result<(), RegistryError> {
    let valid = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if !valid {
        return Err(RegistryError::InvalidMetadata(format!(
            "Field {field} may only contain letters, digits, '_' and '-' (1 to 64 characters)"
        )));
    }

    Ok(())
}

/// A single mailbox: one `@`, no whitespace or control characters
pub fn validate_email(value: &str) -> Result<(), RegistryError> {
    let valid = value.len() <= 254
        && value.matches('@').count() == 1
        && !value.starts_with('@')
        && !value.ends_with('@')
        && !value.chars().any(|c| c.is_whitespace() || c.is_control());

    if !valid {
        return Err(RegistryError::InvalidMetadata(format!(
            "Invalid email address {value:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> Value {
        json!({
            "username": "alice",
            "name": "flowmon",
            "description": "Flow monitor",
            "version": "1.0",
            "license": "MIT",
        })
    }

    #[test]
    fn test_minimal_package_is_valid() {
        assert!(validate(PACKAGE_SCHEMA, &package()).is_ok());
    }

    #[test]
    fn test_every_required_package_field_is_enforced() {
        for field in ["username", "name", "description", "version", "license"] {
            let mut doc = package();
            doc.as_object_mut().unwrap().remove(field);
            match validate(PACKAGE_SCHEMA, &doc) {
                Err(RegistryError::InvalidMetadata(msg)) => assert!(msg.contains(field)),
                other => panic!("{field}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_list_fields_must_be_unique_strings() {
        let mut doc = package();
        doc["tags"] = json!(["net", "net"]);
        assert!(validate(PACKAGE_SCHEMA, &doc).is_err());

        doc["tags"] = json!(["net", 3]);
        assert!(validate(PACKAGE_SCHEMA, &doc).is_err());

        doc["tags"] = json!("net");
        assert!(validate(PACKAGE_SCHEMA, &doc).is_err());

        doc["tags"] = json!(["net", "monitoring"]);
        assert!(validate(PACKAGE_SCHEMA, &doc).is_ok());
    }

    #[test]
    fn test_account_schema_requires_credentials() {
        let doc = json!({"username": "alice", "first_name": "Alice", "email": "a@example.com"});
        assert!(validate(ACCOUNT_SCHEMA, &doc).is_err());
        assert!(validate(ACCOUNT_SCHEMA, &json!("alice")).is_err());
    }

    #[test]
    fn test_identifiers_cannot_escape_paths() {
        assert!(validate_identifier("name", "flow_mon-2").is_ok());
        assert!(validate_identifier("name", "../etc").is_err());
        assert!(validate_identifier("name", "a/b").is_err());
        assert!(validate_identifier("name", "").is_err());
        assert!(validate_identifier("name", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_emails_cannot_carry_headers() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@example.com\r\nBcc: eve@example.com").is_err());
        assert!(validate_email("alice@example.com\nX: y").is_err());
        assert!(validate_email("alice example@com").is_err());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_schema_document_lists_required_fields() {
        let doc = schema_document(ACCOUNT_SCHEMA);
        assert_eq!(
            doc["required"],
            json!(["username", "first_name", "password", "email"])
        );
        assert_eq!(doc["fields"][0]["type"], "string");
        assert!(schema_by_name("package").is_some());
        assert!(schema_by_name("napp").is_none());
    }
}
