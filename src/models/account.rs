use super::codec::{decode_bool, decode_time, encode_bool, encode_time, optional, required};
use super::keys;
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const AVATAR_BASE_URL: &str = "https://www.gravatar.com/avatar/";

/// A registered account as persisted
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Registration document; the password is plaintext until the credential store hashes it
#[derive(Deserialize, Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// The only account fields ever embedded in package or comment views
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicProfile {
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub avatar: String,
}

/// Account as shown to API callers
#[derive(Serialize, Debug, Clone)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub avatar: String,
}

impl Account {
    pub fn key(&self) -> String {
        keys::account(&self.username)
    }

    pub fn avatar(&self) -> String {
        avatar_url(&self.email)
    }

    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar: self.avatar(),
        }
    }

    pub fn into_view(self) -> AccountView {
        let avatar = self.avatar();
        AccountView {
            account: self,
            avatar,
        }
    }

    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("username".to_string(), self.username.clone());
        fields.insert("email".to_string(), self.email.clone());
        fields.insert("first_name".to_string(), self.first_name.clone());
        fields.insert("password".to_string(), self.password_hash.clone());
        fields.insert("enabled".to_string(), encode_bool(self.enabled));
        fields.insert("created_at".to_string(), encode_time(&self.created_at));

        let optional_fields = [
            ("last_name", &self.last_name),
            ("phone", &self.phone),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
        ];
        for (name, value) in optional_fields {
            fields.insert(name.to_string(), value.clone().unwrap_or_default());
        }

        fields
    }

    pub fn from_fields(
        key: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            username: required(fields, key, "username")?.to_string(),
            email: required(fields, key, "email")?.to_string(),
            first_name: required(fields, key, "first_name")?.to_string(),
            last_name: optional(fields, "last_name"),
            phone: optional(fields, "phone"),
            city: optional(fields, "city"),
            state: optional(fields, "state"),
            country: optional(fields, "country"),
            password_hash: required(fields, key, "password")?.to_string(),
            enabled: match fields.get("enabled") {
                Some(raw) => decode_bool(raw)?,
                None => false,
            },
            created_at: match fields.get("created_at") {
                Some(raw) => decode_time(raw)?,
                None => DateTime::<Utc>::UNIX_EPOCH,
            },
        })
    }
}

/// Gravatar URL for an email address
pub fn avatar_url(email: &str) -> String {
    let digest = Md5::digest(email.trim().to_lowercase().as_bytes());
    format!("{AVATAR_BASE_URL}{}?d=identicon", hex::encode(digest))
}
