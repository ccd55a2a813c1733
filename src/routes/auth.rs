use crate::error::{ApiError, RegistryError};
use crate::models::{AuthenticatedAccount, BasicCredentials, MessageResponse, Token, TokenClass};
use crate::state::AppState;
use log::{debug, warn};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post};
use tokio::task;

// Login with HTTP Basic credentials, returning a session token
#[get("/api/auth")]
pub async fn login(
    credentials: BasicCredentials,
    state: &State<AppState>,
) -> Result<(Status, Json<Token>), ApiError> {
    let store = state.credentials.clone();
    let BasicCredentials { username, password } = credentials;

    let checked_username = username.clone();
    let valid = task::spawn_blocking(move || store.check_auth(&checked_username, &password)).await?;
    if !valid {
        debug!("Login failed for {username}");
        return Err(ApiError::Unauthorized);
    }

    match state.tokens.issue(&username, TokenClass::Session) {
        Ok(token) => {
            debug!("Session started for {username}");
            Ok((Status::Created, Json(token)))
        }
        Err(RegistryError::InvalidOperation(reason)) => {
            warn!("Login refused for {username}: {reason}");
            Err(ApiError::Unauthorized)
        }
        Err(e) => Err(e.into()),
    }
}

#[post("/api/auth/verify")]
pub async fn verify(auth: AuthenticatedAccount) -> (Status, Json<MessageResponse>) {
    (
        Status::Created,
        Json(MessageResponse::new(format!(
            "User {} authorization correctly verified",
            auth.username()
        ))),
    )
}

// Logout: revokes one of the caller's own tokens
#[delete("/api/auth/token/<hash>")]
pub async fn revoke_token(
    hash: &str,
    auth: AuthenticatedAccount,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let token = match state.tokens.find(hash) {
        Ok(token) => token,
        Err(RegistryError::TokenNotFound) => {
            return Err(ApiError::NotFound("Token not found".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if token.owner != auth.username() {
        return Err(ApiError::Forbidden(
            "Tokens can only be revoked by their owner".to_string(),
        ));
    }

    state.tokens.revoke(hash)?;
    Ok(Json(MessageResponse::new("Token revoked")))
}
