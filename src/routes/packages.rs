use crate::error::ApiError;
use crate::models::{
    ArtifactUpload, AuthenticatedAccount, MessageResponse, PackageMetadata, PackageView,
};
use crate::services::StoredArtifact;
use crate::state::AppState;
use log::info;
use rocket::http::{ContentType, Header, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put};
use serde::Serialize;
use serde_json::Value;
use std::io::Cursor;

#[derive(Serialize, Debug)]
pub struct PackageList {
    pub packages: Vec<PackageView>,
}

/// Artifact bytes served as an attachment
pub struct ArtifactDownload(StoredArtifact);

impl<'r> Responder<'r, 'static> for ArtifactDownload {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let StoredArtifact { filename, data } = self.0;
        Response::build()
            .status(Status::Ok)
            .header(ContentType::Binary)
            .header(Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{filename}\""),
            ))
            .sized_body(data.len(), Cursor::new(data))
            .ok()
    }
}

/// Splits the optional `artifact` member out of a submitted package document
fn split_submission(body: Value) -> Result<(PackageMetadata, Option<ArtifactUpload>), ApiError> {
    let mut document = body;
    let artifact = match document.as_object_mut().and_then(|o| o.remove("artifact")) {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            serde_json::from_value::<ArtifactUpload>(raw)
                .map_err(|e| ApiError::BadRequest(format!("Invalid artifact: {e}")))?,
        ),
    };

    Ok((PackageMetadata::from_value(document)?, artifact))
}

#[get("/api/packages?<length>")]
pub async fn list_packages(
    length: Option<usize>,
    state: &State<AppState>,
) -> Result<Json<PackageList>, ApiError> {
    let limit = length.filter(|n| *n > 0);
    let packages = state.registry.list_all(limit)?;
    Ok(Json(PackageList { packages }))
}

#[get("/api/packages/<username>")]
pub async fn list_user_packages(
    username: &str,
    state: &State<AppState>,
) -> Result<Json<Vec<PackageView>>, ApiError> {
    Ok(Json(state.registry.list_for_owner(username)?))
}

#[get("/api/packages/<username>/<name>")]
pub async fn get_package(
    username: &str,
    name: &str,
    state: &State<AppState>,
) -> Result<Json<PackageView>, ApiError> {
    Ok(Json(state.registry.get(username, name)?))
}

#[get("/api/packages/<username>/<name>/download?<version>")]
pub async fn download_package(
    username: &str,
    name: &str,
    version: Option<&str>,
    state: &State<AppState>,
) -> Result<ArtifactDownload, ApiError> {
    state.registry.load(username, name)?;
    let artifact = state.artifacts.get(username, name, version)?;
    Ok(ArtifactDownload(artifact))
}

#[post("/api/packages", data = "<body>")]
pub async fn register_package(
    body: Json<Value>,
    auth: AuthenticatedAccount,
    state: &State<AppState>,
) -> Result<(Status, Json<PackageView>), ApiError> {
    let (metadata, artifact) = split_submission(body.into_inner())?;
    let package = state.registry.register(metadata, &auth.account, artifact)?;

    info!("Package {} published by {}", package.key(), auth.username());
    let view = state.registry.get(package.owner(), package.name())?;
    Ok((Status::Created, Json(view)))
}

#[put("/api/packages/<username>/<name>", data = "<body>")]
pub async fn update_package(
    username: &str,
    name: &str,
    body: Json<Value>,
    auth: AuthenticatedAccount,
    state: &State<AppState>,
) -> Result<Json<PackageView>, ApiError> {
    let (metadata, artifact) = split_submission(body.into_inner())?;
    state
        .registry
        .update(username, name, metadata, &auth.account, artifact)?;

    info!("Package {username}/{name} updated");
    Ok(Json(state.registry.get(username, name)?))
}

#[delete("/api/packages/<username>/<name>")]
pub async fn delete_package(
    username: &str,
    name: &str,
    auth: AuthenticatedAccount,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.registry.delete(username, name, &auth.account)?;

    info!("Package {username}/{name} deleted");
    Ok(Json(MessageResponse::new(format!(
        "Package {username}/{name} was deleted"
    ))))
}
