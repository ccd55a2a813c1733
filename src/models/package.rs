use super::account::PublicProfile;
use super::codec::{decode_list, decode_time, encode_list, encode_time, optional, required};
use super::keys;
use super::validation::{PACKAGE_SCHEMA, validate, validate_identifier};
use crate::error::RegistryError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Package metadata as submitted by an owner
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PackageMetadata {
    pub username: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    pub version: String,
    #[serde(default, rename = "napp_dependencies")]
    pub dependencies: Vec<String>,
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PackageMetadata {
    /// Parses a submitted document, accepting the older `author` spelling of `username`
    pub fn from_value(mut document: Value) -> Result<Self, RegistryError> {
        if let Some(object) = document.as_object_mut() {
            if !object.contains_key("username") {
                if let Some(author) = object.remove("author") {
                    object.insert("username".to_string(), author);
                }
            }
        }

        validate(PACKAGE_SCHEMA, &document)?;

        let metadata: Self = serde_json::from_value(document)
            .map_err(|e| RegistryError::InvalidMetadata(format!("Invalid metadata: {e}")))?;

        validate_identifier("username", &metadata.username)?;
        validate_identifier("name", &metadata.name)?;

        Ok(metadata)
    }

    /// README text: the explicit readme, else the long description, else the description
    pub fn resolved_readme(&self) -> String {
        [&self.readme, &self.long_description]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| self.description.clone())
    }
}

/// A registered package as persisted
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Package {
    #[serde(flatten)]
    pub metadata: PackageMetadata,
    /// Every version accepted for this package, oldest first
    pub versions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn owner(&self) -> &str {
        &self.metadata.username
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn key(&self) -> String {
        keys::package(self.owner(), self.name())
    }

    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let m = &self.metadata;
        let mut fields = BTreeMap::new();
        fields.insert("username".to_string(), m.username.clone());
        fields.insert("name".to_string(), m.name.clone());
        fields.insert("description".to_string(), m.description.clone());
        fields.insert(
            "long_description".to_string(),
            m.long_description.clone().unwrap_or_default(),
        );
        fields.insert("version".to_string(), m.version.clone());
        fields.insert("napp_dependencies".to_string(), encode_list(&m.dependencies));
        fields.insert("license".to_string(), m.license.clone());
        fields.insert("url".to_string(), m.url.clone().unwrap_or_default());
        fields.insert("readme".to_string(), m.readme.clone().unwrap_or_default());
        fields.insert("tags".to_string(), encode_list(&m.tags));
        fields.insert("versions".to_string(), encode_list(&self.versions));
        fields.insert("created_at".to_string(), encode_time(&self.created_at));
        fields.insert("updated_at".to_string(), encode_time(&self.updated_at));
        fields
    }

    pub fn from_fields(
        key: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Self, RegistryError> {
        let list = |name: &str| match fields.get(name) {
            Some(raw) => decode_list(raw),
            None => Ok(Vec::new()),
        };

        let metadata = PackageMetadata {
            username: required(fields, key, "username")?.to_string(),
            name: required(fields, key, "name")?.to_string(),
            description: required(fields, key, "description")?.to_string(),
            long_description: optional(fields, "long_description"),
            version: required(fields, key, "version")?.to_string(),
            dependencies: list("napp_dependencies")?,
            license: required(fields, key, "license")?.to_string(),
            url: optional(fields, "url"),
            readme: optional(fields, "readme"),
            tags: list("tags")?,
        };

        let created_at = decode_time(required(fields, key, "created_at")?)?;
        let updated_at = match fields.get("updated_at") {
            Some(raw) => decode_time(raw)?,
            None => created_at,
        };

        Ok(Self {
            metadata,
            versions: list("versions")?,
            created_at,
            updated_at,
        })
    }
}

/// Package with its derived fields, as returned to readers
#[derive(Serialize, Debug, Clone)]
pub struct PackageView {
    #[serde(flatten)]
    pub package: Package,
    pub author: PublicProfile,
    pub comment_count: usize,
    pub latest_artifact: Option<String>,
}

/// Artifact payload carried alongside package metadata
#[derive(Deserialize, Debug, Clone)]
pub struct ArtifactUpload {
    pub filename: String,
    /// Base64 encoded archive
    pub data: String,
}

impl ArtifactUpload {
    pub fn decode(&self) -> Result<Vec<u8>, RegistryError> {
        STANDARD
            .decode(self.data.trim())
            .map_err(|e| RegistryError::InvalidMetadata(format!("Invalid artifact encoding: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "username": "alice",
            "name": "flowmon",
            "description": "Flow monitor",
            "version": "1.0",
            "license": "MIT",
            "tags": ["monitoring"],
        })
    }

    #[test]
    fn test_author_is_accepted_for_username() {
        let mut doc = document();
        doc.as_object_mut().unwrap().remove("username");
        doc["author"] = json!("alice");

        let metadata = PackageMetadata::from_value(doc).unwrap();
        assert_eq!(metadata.username, "alice");
    }

    #[test]
    fn test_unsafe_names_are_rejected() {
        let mut doc = document();
        doc["name"] = json!("../flowmon");
        assert!(matches!(
            PackageMetadata::from_value(doc),
            Err(RegistryError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn test_readme_falls_back_to_descriptions() {
        let mut metadata = PackageMetadata::from_value(document()).unwrap();
        assert_eq!(metadata.resolved_readme(), "Flow monitor");

        metadata.long_description = Some("Longer text".to_string());
        assert_eq!(metadata.resolved_readme(), "Longer text");

        metadata.readme = Some("# flowmon".to_string());
        assert_eq!(metadata.resolved_readme(), "# flowmon");
    }

    #[test]
    fn test_stored_fields_decode() {
        let now = Utc::now();
        let package = Package {
            metadata: PackageMetadata::from_value(document()).unwrap(),
            versions: vec!["1.0".to_string()],
            created_at: now,
            updated_at: now,
        };

        let decoded = Package::from_fields(&package.key(), &package.to_fields()).unwrap();
        assert_eq!(decoded.metadata, package.metadata);
        assert_eq!(decoded.versions, vec!["1.0"]);
        assert_eq!(package.key(), "package:alice/flowmon");
    }

    #[test]
    fn test_artifact_payload_must_be_base64() {
        let upload = ArtifactUpload {
            filename: "flowmon.napp".to_string(),
            data: "not base64!".to_string(),
        };
        assert!(upload.decode().is_err());

        let upload = ArtifactUpload {
            filename: "flowmon.napp".to_string(),
            data: STANDARD.encode(b"archive"),
        };
        assert_eq!(upload.decode().unwrap(), b"archive");
    }
}
