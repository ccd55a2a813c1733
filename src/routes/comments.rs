use crate::error::ApiError;
use crate::models::{AuthenticatedAccount, CommentTarget, CommentView, NewComment};
use crate::state::AppState;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, post};

fn package_target(username: &str, name: &str) -> CommentTarget {
    CommentTarget::Package {
        owner: username.to_string(),
        name: name.to_string(),
    }
}

#[get("/api/users/<username>/comments")]
pub async fn list_user_comments(
    username: &str,
    state: &State<AppState>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let target = CommentTarget::Account(username.to_string());
    Ok(Json(state.comments.list_for(&target)?))
}

#[post("/api/users/<username>/comments", data = "<comment>")]
pub async fn add_user_comment(
    username: &str,
    comment: Json<NewComment>,
    auth: AuthenticatedAccount,
    state: &State<AppState>,
) -> Result<(Status, Json<CommentView>), ApiError> {
    let target = CommentTarget::Account(username.to_string());
    let view = state.comments.add(&target, &auth.account, &comment.body)?;
    Ok((Status::Created, Json(view)))
}

#[get("/api/packages/<username>/<name>/comments")]
pub async fn list_package_comments(
    username: &str,
    name: &str,
    state: &State<AppState>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    Ok(Json(
        state.comments.list_for(&package_target(username, name))?,
    ))
}

#[post("/api/packages/<username>/<name>/comments", data = "<comment>")]
pub async fn add_package_comment(
    username: &str,
    name: &str,
    comment: Json<NewComment>,
    auth: AuthenticatedAccount,
    state: &State<AppState>,
) -> Result<(Status, Json<CommentView>), ApiError> {
    let view = state
        .comments
        .add(&package_target(username, name), &auth.account, &comment.body)?;
    Ok((Status::Created, Json(view)))
}
