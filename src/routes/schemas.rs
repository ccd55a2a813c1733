use crate::error::ApiError;
use crate::models::validation::{schema_by_name, schema_document};
use rocket::get;
use rocket::serde::json::Json;
use serde_json::Value;

#[get("/api/schemas/<name>")]
pub async fn get_schema(name: &str) -> Result<Json<Value>, ApiError> {
    schema_by_name(name)
        .map(|schema| Json(schema_document(schema)))
        .ok_or_else(|| ApiError::NotFound(format!("Schema {name} not found")))
}
