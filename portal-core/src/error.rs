use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The backend answered `success: false`.
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    /// Failures worth retrying or silently skipping: the request may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Timeout(_) | AppError::Network(_) | AppError::ServiceUnavailable => true,
            AppError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Map a non-success HTTP status from a downstream service into the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 422 => AppError::BadRequest(anyhow::anyhow!(message)),
            401 => AppError::Unauthorized(anyhow::anyhow!(message)),
            403 => AppError::Forbidden(anyhow::anyhow!(message)),
            404 => AppError::NotFound(anyhow::anyhow!(message)),
            409 => AppError::Conflict(anyhow::anyhow!(message)),
            408 | 504 => AppError::Timeout(message),
            503 => AppError::ServiceUnavailable,
            _ => AppError::Upstream { status, message },
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            AppError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            AppError::from_status(status.as_u16(), err.to_string())
        } else {
            AppError::InternalError(anyhow::Error::new(err))
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

fn field_messages(errors: &validator::ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            fields: Option<BTreeMap<String, Vec<String>>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            redirect: Option<&'static str>,
        }

        let mut fields = None;
        let mut redirect = None;

        let (status, error_message, details) = match self {
            AppError::ValidationError(err) => {
                fields = Some(field_messages(&err));
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Validation error".to_string(),
                    None,
                )
            }
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            AppError::NotFound(err) => (
                StatusCode::NOT_FOUND,
                "We couldn't find what you were looking for".to_string(),
                Some(err.to_string()),
            ),
            AppError::Unauthorized(err) => {
                redirect = Some("login");
                (StatusCode::UNAUTHORIZED, err.to_string(), None)
            }
            AppError::Forbidden(err) => (StatusCode::FORBIDDEN, err.to_string(), None),
            AppError::Conflict(err) => (StatusCode::CONFLICT, err.to_string(), None),
            AppError::Timeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "The request timed out, please try again".to_string(),
                Some(msg),
            ),
            AppError::Network(msg) => (
                StatusCode::BAD_GATEWAY,
                "Could not reach the server, please try again".to_string(),
                Some(msg),
            ),
            AppError::Upstream { status, message } => (
                StatusCode::BAD_GATEWAY,
                "Something went wrong, please try again".to_string(),
                Some(format!("upstream {}: {}", status, message)),
            ),
            AppError::Rejected(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, None),
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(format!("{:#}", err)),
            ),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
                None,
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
                Some(err.to_string()),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
                fields,
                redirect,
            }),
        )
            .into_response()
    }
}
