use rocket::http::{ContentType, Header, Status};
use rocket::response::{Responder, Response};
use rocket::Request;
use std::io::Cursor;
use thiserror::Error;

/// Challenge text returned for every authentication failure, whatever the cause.
pub const CHALLENGE_MESSAGE: &str = "Could not verify your access level for that URL. \
You have to login with proper credentials";

/// Failures raised by the registry core.
///
/// `TokenNotFound` and `TokenExpired` stay distinct here so callers and tests
/// can tell them apart; the HTTP layer collapses both into the same challenge.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    DuplicateEntry(String),
    #[error("{0}")]
    InvalidMetadata(String),
    #[error("{0}")]
    InvalidOwner(String),
    #[error("{0}")]
    InvalidOperation(String),
    #[error("token not found")]
    TokenNotFound,
    #[error("token expired")]
    TokenExpired,
    #[error("storage failure: {0}")]
    StorageFailure(String),
    #[error("delivery failure: {0}")]
    DeliveryFailure(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

impl From<diesel::result::Error> for RegistryError {
    fn from(err: diesel::result::Error) -> Self {
        RegistryError::StorageFailure(format!("Database query error: {err}"))
    }
}

impl From<diesel::r2d2::PoolError> for RegistryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RegistryError::StorageFailure(format!("Database connection error: {err}"))
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::StorageFailure(format!("I/O error: {err}"))
    }
}

impl From<bcrypt::BcryptError> for RegistryError {
    fn from(err: bcrypt::BcryptError) -> Self {
        RegistryError::StorageFailure(format!("Password hashing error: {err}"))
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(String),
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (Status::BadRequest, msg),
            ApiError::Unauthorized => (Status::Unauthorized, CHALLENGE_MESSAGE.to_string()),
            ApiError::Forbidden(msg) => (Status::Forbidden, msg),
            ApiError::NotFound(msg) => (Status::NotFound, msg),
            ApiError::Conflict(msg) => (Status::Conflict, msg),
            ApiError::InternalServerError(msg) => (Status::InternalServerError, msg),
        };

        let mut response = Response::build();
        response
            .status(status)
            .header(ContentType::Plain)
            .sized_body(message.len(), Cursor::new(message));

        if status == Status::Unauthorized {
            response.header(Header::new(
                "WWW-Authenticate",
                "Basic realm=\"Login Required\"",
            ));
        }

        response.ok()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(msg) => ApiError::NotFound(msg),
            RegistryError::DuplicateEntry(msg) => ApiError::Conflict(msg),
            RegistryError::InvalidMetadata(msg) => ApiError::BadRequest(msg),
            RegistryError::InvalidOwner(msg) => ApiError::Forbidden(msg),
            RegistryError::InvalidOperation(msg) => ApiError::Conflict(msg),
            RegistryError::TokenNotFound | RegistryError::TokenExpired => ApiError::Unauthorized,
            RegistryError::StorageFailure(msg) | RegistryError::DeliveryFailure(msg) => {
                ApiError::InternalServerError(msg)
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::InternalServerError(format!("Background worker failed: {err}"))
    }
}
