use crate::error::ApiError;
use crate::models::keys;
use crate::state::AppState;
use rocket::serde::json::Json;
use rocket::{State, get};
use serde_json::{Value, json};

#[get("/")]
pub async fn index() -> &'static str {
    "NApps registry is running!"
}

#[get("/api/health")]
pub async fn health_check(state: &State<AppState>) -> Result<Json<Value>, ApiError> {
    let users = state.store.scard(keys::ACCOUNTS)?;
    let packages = state.store.scard(keys::PACKAGES)?;

    Ok(Json(json!({
        "status": "ok",
        "users": users,
        "packages": packages,
    })))
}
