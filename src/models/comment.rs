use super::account::PublicProfile;
use super::codec::{decode_time, encode_time, required};
use super::keys;
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Display format for comment timestamps
pub const COMMENT_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M";

/// What a comment is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentTarget {
    Account(String),
    Package { owner: String, name: String },
}

impl CommentTarget {
    /// Key of the record the comment hangs off
    pub fn record_key(&self) -> String {
        match self {
            CommentTarget::Account(username) => keys::account(username),
            CommentTarget::Package { owner, name } => keys::package(owner, name),
        }
    }

    pub fn list_key(&self) -> String {
        match self {
            CommentTarget::Account(username) => keys::account_comments(username),
            CommentTarget::Package { owner, name } => keys::package_comments(owner, name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub target: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

impl Comment {
    pub fn key(&self) -> String {
        keys::comment(&self.id)
    }

    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), self.id.clone());
        fields.insert("target".to_string(), self.target.clone());
        fields.insert("author".to_string(), self.author.clone());
        fields.insert("created_at".to_string(), encode_time(&self.created_at));
        fields.insert("body".to_string(), self.body.clone());
        fields
    }

    pub fn from_fields(
        key: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            id: required(fields, key, "id")?.to_string(),
            target: required(fields, key, "target")?.to_string(),
            author: required(fields, key, "author")?.to_string(),
            created_at: decode_time(required(fields, key, "created_at")?)?,
            body: required(fields, key, "body")?.to_string(),
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct NewComment {
    pub body: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct CommentView {
    pub id: String,
    pub author: PublicProfile,
    pub date: String,
    pub body: String,
}

impl CommentView {
    pub fn new(comment: Comment, author: PublicProfile) -> Self {
        Self {
            id: comment.id,
            author,
            date: comment.created_at.format(COMMENT_DATE_FORMAT).to_string(),
            body: comment.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_target_keys() {
        let account = CommentTarget::Account("alice".to_string());
        assert_eq!(account.record_key(), "user:alice");
        assert_eq!(account.list_key(), "user:alice:comments");

        let package = CommentTarget::Package {
            owner: "alice".to_string(),
            name: "flowmon".to_string(),
        };
        assert_eq!(package.list_key(), "package:alice/flowmon:comments");
    }

    #[test]
    fn test_view_formats_date() {
        let comment = Comment {
            id: "1".to_string(),
            target: "user:alice".to_string(),
            author: "bob".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap(),
            body: "nice".to_string(),
        };
        let author = PublicProfile {
            username: "bob".to_string(),
            first_name: "Bob".to_string(),
            last_name: None,
            avatar: String::new(),
        };

        assert_eq!(
            CommentView::new(comment, author).date,
            "Tue, 05 Mar 2024 14:07"
        );
    }
}
