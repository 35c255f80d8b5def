use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relax_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `relax_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The requested structure does not exist yet (e.g. relaxed before
    /// the job finished).
    #[error("Structure not available: {0}")]
    StructureNotAvailable(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::StructureNotAvailable(msg) => (
                StatusCode::NOT_FOUND,
                "STRUCTURE_NOT_AVAILABLE",
                msg.clone(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a domain error onto an HTTP status, error code and message.
///
/// Caller-correctable conditions keep their message; invariant violations
/// are logged and replaced with a generic message.
fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        CoreError::MaterialNotFound(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "MATERIAL_NOT_FOUND", message)
        }
        CoreError::MalformedIdentifier(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "MATERIAL_MALFORMED", message)
        }
        CoreError::CredentialMalformed => {
            (StatusCode::UNPROCESSABLE_ENTITY, "API_KEY_MALFORMED", message)
        }
        CoreError::CredentialExpired => {
            (StatusCode::UNPROCESSABLE_ENTITY, "API_KEY_EXPIRED", message)
        }
        CoreError::JobNotFound(_) => (StatusCode::NOT_FOUND, "JOB_NOT_FOUND", message),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Upstream(msg) => {
            tracing::warn!(error = %msg, "Upstream failure surfaced to client");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message)
        }
        CoreError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN", message),
        CoreError::JobAlreadyExists(_)
        | CoreError::InvalidTransition { .. }
        | CoreError::Internal(_) => {
            tracing::error!(error = %err, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}
