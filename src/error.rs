use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::utils::ImageError;

#[derive(Debug)]
pub enum AppError {
    DatabaseError(sea_orm::DbErr),
    NotFound(String),
    Unauthorized(String),
    BadRequest(String),
    TooManyRequests(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let challenge = matches!(self, AppError::Unauthorized(_));
        let (status, error_message) = match self {
            AppError::DatabaseError(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        let mut response = (status, body).into_response();
        if challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        if err.is_client_error() {
            AppError::BadRequest(err.to_string())
        } else {
            AppError::InternalServerError(format!("Image processing failed: {}", err))
        }
    }
}

/// True when the error is a unique-constraint violation reported by the database.
pub fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}
