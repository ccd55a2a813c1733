use super::codec::{decode_time, encode_time, required};
use super::keys;
use crate::error::RegistryError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Lifetime class a token is issued under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Confirmation,
    Session,
}

/// Where a token stands at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active { remaining_secs: i64 },
    Expired,
    Revoked,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Token {
    pub hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "user")]
    pub owner: String,
    #[serde(rename = "expiration_time")]
    pub expiration_secs: i64,
}

impl Token {
    pub fn key(&self) -> String {
        keys::token(&self.hash)
    }

    /// Fails for a duration that does not fit the calendar
    pub fn expires_at(&self) -> Result<DateTime<Utc>, RegistryError> {
        Duration::try_seconds(self.expiration_secs)
            .and_then(|ttl| self.created_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                RegistryError::StorageFailure(format!(
                    "token {} has out of range expiration_time {}",
                    self.hash, self.expiration_secs
                ))
            })
    }

    /// A zero duration means the token was revoked; otherwise the window is inclusive
    pub fn state_at(&self, now: DateTime<Utc>) -> Result<TokenState, RegistryError> {
        if self.expiration_secs <= 0 {
            return Ok(TokenState::Revoked);
        }

        let expires_at = self.expires_at()?;
        if now <= expires_at {
            Ok(TokenState::Active {
                remaining_secs: (expires_at - now).num_seconds(),
            })
        } else {
            Ok(TokenState::Expired)
        }
    }

    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("hash".to_string(), self.hash.clone());
        fields.insert("created_at".to_string(), encode_time(&self.created_at));
        fields.insert("user".to_string(), self.owner.clone());
        fields.insert(
            "expiration_time".to_string(),
            self.expiration_secs.to_string(),
        );
        fields
    }

    pub fn from_fields(
        key: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Self, RegistryError> {
        let expiration = required(fields, key, "expiration_time")?;
        let expiration_secs = expiration.parse::<i64>().map_err(|e| {
            RegistryError::StorageFailure(format!(
                "record {key} has invalid expiration_time {expiration:?}: {e}"
            ))
        })?;

        Ok(Self {
            hash: required(fields, key, "hash")?.to_string(),
            created_at: decode_time(required(fields, key, "created_at")?)?,
            owner: required(fields, key, "user")?.to_string(),
            expiration_secs,
        })
    }
}
