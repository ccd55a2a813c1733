use super::account::{Account, AccountView};
use crate::error::ApiError;
use crate::services::NotificationStatus;
use crate::state::AppState;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::debug;
use rocket::serde::{Deserialize, Serialize};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome, Request},
};

#[derive(Deserialize, Debug)]
pub struct PasswordChange {
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RegistrationResponse {
    pub user: AccountView,
    pub notification: NotificationStatus,
}

// Authorization guard resolving the bearer token to its owning account
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub account: Account,
    pub token: String,
}

impl AuthenticatedAccount {
    pub fn username(&self) -> &str {
        &self.account.username
    }
}

fn bearer_token<'a>(request: &'a Request<'_>) -> Option<&'a str> {
    let value = request.headers().get_one("Authorization")?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("Token "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedAccount {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(state) = request.rocket().state::<AppState>() else {
            return Outcome::Error((
                Status::InternalServerError,
                ApiError::InternalServerError("Application state missing".to_string()),
            ));
        };

        let Some(token) = bearer_token(request) else {
            return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized));
        };

        match state.tokens.owner_of(token) {
            Ok(account) if account.enabled => Outcome::Success(AuthenticatedAccount {
                account,
                token: token.to_string(),
            }),
            Ok(account) => {
                debug!("Rejected token of disabled account {}", account.username);
                Outcome::Error((Status::Unauthorized, ApiError::Unauthorized))
            }
            Err(e) => {
                debug!("Rejected token: {e}");
                Outcome::Error((Status::Unauthorized, ApiError::Unauthorized))
            }
        }
    }
}

/// Credentials from an HTTP Basic `Authorization` header
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    pub fn parse(header: &str) -> Option<Self> {
        let encoded = header.strip_prefix("Basic ")?.trim();
        let decoded = STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;

        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BasicCredentials {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request
            .headers()
            .get_one("Authorization")
            .and_then(BasicCredentials::parse)
        {
            Some(credentials) => Outcome::Success(credentials),
            None => Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_header() {
        let header = format!("Basic {}", STANDARD.encode("alice:secret:123"));
        let credentials = BasicCredentials::parse(&header).unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.password, "secret:123");

        assert!(BasicCredentials::parse("Bearer abc").is_none());
        assert!(BasicCredentials::parse("Basic !!!").is_none());
        assert!(BasicCredentials::parse(&format!("Basic {}", STANDARD.encode("alice"))).is_none());
    }
}
