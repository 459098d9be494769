use axum::{
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::mail::MailError;
use crate::validation::FieldErrors;

/// Unified application error.
///
/// Client-facing variants carry the message shown to the caller. Everything
/// else is a server failure: it is logged with full detail and answered
/// with a generic message, so driver or transport errors never leak.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error.")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    TooManyRequests(&'static str),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Security error: {0}")]
    Security(String),

    #[error("{message}")]
    OperationFailed {
        message: &'static str,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attach the operation name shown to clients when this is a server
    /// failure. Client errors pass through untouched.
    pub fn context(self, message: &'static str) -> AppError {
        if self.status().is_server_error() && !matches!(self, AppError::OperationFailed { .. }) {
            AppError::OperationFailed {
                message,
                source: Box::new(self),
            }
        } else {
            self
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> AppError {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    /// Message safe to show to an end user.
    pub fn public_message(&self) -> String {
        match self {
            AppError::OperationFailed { message, .. } => message.to_string(),
            other if other.status().is_server_error() => "Server error.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            match &self {
                AppError::OperationFailed { message, source } => {
                    tracing::error!(error = %source, "{}", message);
                }
                other => tracing::error!(error = %other, "Unhandled server error"),
            }
        }

        let body = match &self {
            AppError::Validation(errors) => json!({
                "message": "Validation error.",
                "errors": errors,
            }),
            other => json!({ "message": other.public_message() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<pbkdf2::password_hash::Error> for AppError {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        AppError::Security(err.to_string())
    }
}
