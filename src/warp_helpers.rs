use crate::db::DbPool;
use crate::upload_orchestrator::{UploadError, UploadOrchestrator};
use serde::Serialize;
use std::convert::Infallible;

use warp::http::StatusCode;
use warp::{reject, Filter, Rejection, Reply};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub code: u16,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct DatabaseError {
    pub message: String,
}

impl reject::Reject for DatabaseError {}

#[derive(Debug)]
pub struct NotFoundError {
    pub message: String,
}

impl reject::Reject for NotFoundError {}

#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl reject::Reject for ValidationError {}

#[derive(Debug)]
pub struct StorageUnavailable {
    pub message: String,
}

impl reject::Reject for StorageUnavailable {}

impl reject::Reject for UploadError {}

pub fn database_error(e: impl std::fmt::Display) -> Rejection {
    log::error!("Database error: {}", e);
    reject::custom(DatabaseError {
        message: format!("Database error: {}", e),
    })
}

pub fn not_found(message: impl Into<String>) -> Rejection {
    reject::custom(NotFoundError {
        message: message.into(),
    })
}

pub fn validation_error(message: impl Into<String>) -> Rejection {
    reject::custom(ValidationError {
        message: message.into(),
    })
}

pub fn with_db(db_pool: DbPool) -> impl Filter<Extract = (DbPool,), Error = Infallible> + Clone {
    warp::any().map(move || db_pool.clone())
}

pub fn with_orchestrator(
    orchestrator: UploadOrchestrator,
) -> impl Filter<Extract = (UploadOrchestrator,), Error = Infallible> + Clone {
    warp::any().map(move || orchestrator.clone())
}

pub fn upload_error_status(err: &UploadError) -> StatusCode {
    match err {
        UploadError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        UploadError::NotFound(_) => StatusCode::NOT_FOUND,
        UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        UploadError::Image(_) => StatusCode::UNPROCESSABLE_ENTITY,
        UploadError::Conflict(_) => StatusCode::INTERNAL_SERVER_ERROR,
        UploadError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Status, kind and message reported for a rejection.
fn classify_rejection(err: &Rejection) -> (StatusCode, &'static str, String) {
    if err.is_not_found() {
        (StatusCode::NOT_FOUND, "NOT_FOUND", "Not Found".to_string())
    } else if let Some(upload_error) = err.find::<UploadError>() {
        (
            upload_error_status(upload_error),
            upload_error.kind(),
            upload_error.to_string(),
        )
    } else if let Some(database_error) = err.find::<DatabaseError>() {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "DATABASE_ERROR",
            database_error.message.clone(),
        )
    } else if let Some(storage_error) = err.find::<StorageUnavailable>() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "STORAGE_UNAVAILABLE",
            storage_error.message.clone(),
        )
    } else if let Some(not_found_error) = err.find::<NotFoundError>() {
        (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            not_found_error.message.clone(),
        )
    } else if let Some(validation_error) = err.find::<ValidationError>() {
        (
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            validation_error.message.clone(),
        )
    } else if let Some(body_error) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "INVALID_INPUT", body_error.to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            "Invalid query string".to_string(),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "PAYLOAD_TOO_LARGE",
            "Payload too large".to_string(),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "UNSUPPORTED_MEDIA_TYPE",
            "Unsupported media type".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "METHOD_NOT_ALLOWED",
            "Method not allowed".to_string(),
        )
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "Internal server error".to_string(),
        )
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, kind, message) = classify_rejection(&err);

    let error_response = ErrorResponse {
        error: message,
        kind: kind.to_string(),
        code: code.as_u16(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&error_response),
        code,
    ))
}

pub fn cors(origin: &str) -> warp::cors::Builder {
    warp::cors()
        .allow_origin(origin)
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
}
