use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;

pub const STATUS_NOT_FOUND: &str = "not found";
pub const STATUS_VALIDATION: &str = "validation error";
pub const STATUS_QUEUE_FULL: &str = "scan queue is full";
pub const STATUS_UNAUTHORIZED: &str = "unauthorized";
pub const STATUS_CONFLICT: &str = "conflict";
pub const STATUS_INTERNAL: &str = "internal error";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    ValidationError(String),

    /// A tool is missing or misconfigured. The message is the response status,
    /// e.g. `Invalid nmap path`.
    Configuration(String),

    QueueFull,

    Unauthorized(String),

    Conflict(String),

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Self::QueueFull => f.write_str(STATUS_QUEUE_FULL),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ApiResponse::<()>::error(STATUS_NOT_FOUND, Some(msg)),
            ),
            Self::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::error(STATUS_VALIDATION, Some(msg)),
            ),
            Self::Configuration(msg) => {
                tracing::warn!(error = %msg, "Tool configuration error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiResponse::error(msg, None),
                )
            }
            Self::QueueFull => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::error(STATUS_QUEUE_FULL, None),
            ),
            Self::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::error(STATUS_UNAUTHORIZED, Some(msg)),
            ),
            Self::Conflict(msg) => (
                StatusCode::CONFLICT,
                ApiResponse::error(STATUS_CONFLICT, Some(msg)),
            ),
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error(STATUS_INTERNAL, None),
                )
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error(STATUS_INTERNAL, None),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl ApiError {
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}
