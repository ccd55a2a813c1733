pub mod auth;
pub mod comments;
pub mod health;
pub mod packages;
pub mod schemas;
pub mod users;

use crate::error::ApiError;
use rocket::{Catcher, Request, catch, catchers, routes};

pub fn get_routes() -> Vec<rocket::Route> {
    routes![
        health::index,
        health::health_check,
        schemas::get_schema,
        // Authentication
        auth::login,
        auth::verify,
        auth::revoke_token,
        // Accounts
        users::list_users,
        users::get_user,
        users::register,
        users::confirm_user,
        users::change_password,
        users::delete_user,
        // Packages
        packages::list_packages,
        packages::list_user_packages,
        packages::get_package,
        packages::download_package,
        packages::register_package,
        packages::update_package,
        packages::delete_package,
        // Comments
        comments::list_user_comments,
        comments::add_user_comment,
        comments::list_package_comments,
        comments::add_package_comment,
    ]
}

#[catch(401)]
fn unauthorized() -> ApiError {
    ApiError::Unauthorized
}

#[catch(404)]
fn not_found(request: &Request<'_>) -> ApiError {
    ApiError::NotFound(format!("{} not found", request.uri()))
}

#[catch(422)]
fn unprocessable() -> ApiError {
    ApiError::BadRequest("Malformed request body".to_string())
}

#[catch(400)]
fn bad_request() -> ApiError {
    ApiError::BadRequest("Bad request".to_string())
}

pub fn get_catchers() -> Vec<Catcher> {
    catchers![unauthorized, not_found, unprocessable, bad_request]
}
