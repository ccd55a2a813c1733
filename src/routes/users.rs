use crate::error::ApiError;
use crate::models::validation::{ACCOUNT_SCHEMA, validate};
use crate::models::{
    AccountView, AuthenticatedAccount, CommentTarget, MessageResponse, NewAccount, PasswordChange,
    RegistrationResponse, TokenClass,
};
use crate::state::AppState;
use log::info;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::serde::json::{Json, Value};
use rocket::{State, delete, get, post, put};
use std::collections::BTreeMap;
use tokio::task;

#[derive(rocket::serde::Serialize, Debug)]
pub struct AccountList {
    pub users: BTreeMap<String, AccountView>,
}

#[get("/api/users")]
pub async fn list_users(state: &State<AppState>) -> Result<Json<AccountList>, ApiError> {
    let users = state
        .credentials
        .list_all()?
        .into_iter()
        .map(|account| (account.username.clone(), account.into_view()))
        .collect();

    Ok(Json(AccountList { users }))
}

#[get("/api/users/<username>")]
pub async fn get_user(username: &str, state: &State<AppState>) -> Result<Json<AccountView>, ApiError> {
    Ok(Json(state.credentials.get(username)?.into_view()))
}

// Registration: creates a disabled account and mails a confirmation link
#[post("/api/users", data = "<body>")]
pub async fn register(
    body: Json<Value>,
    state: &State<AppState>,
) -> Result<(Status, Json<RegistrationResponse>), ApiError> {
    let document = body.into_inner();
    validate(ACCOUNT_SCHEMA, &document)?;
    let new_account: NewAccount = serde_json::from_value(document)
        .map_err(|e| ApiError::BadRequest(format!("Invalid account: {e}")))?;

    let credentials = state.credentials.clone();
    let account = task::spawn_blocking(move || credentials.create(new_account)).await??;

    let token = state.tokens.issue(&account.username, TokenClass::Confirmation)?;
    let notification = state.notifier.send_confirmation(&account, &token);

    info!("User registered: {}", account.username);
    Ok((
        Status::Created,
        Json(RegistrationResponse {
            user: account.into_view(),
            notification,
        }),
    ))
}

#[get("/api/users/<username>/confirm/<token>")]
pub async fn confirm_user(
    username: &str,
    token: &str,
    state: &State<AppState>,
) -> Result<Redirect, ApiError> {
    let account = state.tokens.confirm_account(username, token)?;
    state.notifier.send_welcome(&account);

    info!("User confirmed: {username}");
    Ok(Redirect::temporary(format!(
        "{}?activated",
        state.config.site_url
    )))
}

#[put("/api/users/<username>/password", data = "<change>")]
pub async fn change_password(
    username: &str,
    change: Json<PasswordChange>,
    auth: AuthenticatedAccount,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    if auth.username() != username {
        return Err(ApiError::Forbidden(
            "You can only change your own password".to_string(),
        ));
    }

    let PasswordChange { password } = change.into_inner();
    if password.is_empty() {
        return Err(ApiError::BadRequest("Password must not be empty".to_string()));
    }

    let credentials = state.credentials.clone();
    let owner = username.to_string();
    task::spawn_blocking(move || credentials.set_password(&owner, &password)).await??;

    Ok(Json(MessageResponse::new(format!(
        "Password of user {username} changed"
    ))))
}

#[delete("/api/users/<username>")]
pub async fn delete_user(
    username: &str,
    auth: AuthenticatedAccount,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    if auth.username() != username {
        return Err(ApiError::Forbidden(
            "You can only delete your own account".to_string(),
        ));
    }

    state.credentials.delete(username)?;
    state
        .comments
        .purge(&CommentTarget::Account(username.to_string()))?;

    info!("User deleted: {username}");
    Ok(Json(MessageResponse::new(format!("User {username} deleted"))))
}
