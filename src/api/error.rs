use crate::models::ResponseEnvelope;
use crate::services::storage::StorageError;
use crate::utils::validation::FieldErrors;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: Invalid or missing password")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Failed to store data: {0}")]
    Storage(#[from] StorageError),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Storage(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = match self {
            AppError::Unauthorized => {
                ResponseEnvelope::error("Unauthorized: Invalid or missing password")
            }
            AppError::Validation(errors) => {
                ResponseEnvelope::error("Validation failed").with_errors(errors)
            }
            AppError::Storage(e) => {
                tracing::error!("Error storing data: {:?}", e);
                ResponseEnvelope::error("Failed to store data").with_error(e.to_string())
            }
            AppError::Unexpected(e) => {
                tracing::error!("Unexpected error storing data: {:?}", e);
                ResponseEnvelope::error("Failed to store data").with_error(e.to_string())
            }
            AppError::MalformedBody(msg) => {
                ResponseEnvelope::error("Malformed request body").with_error(msg)
            }
            AppError::PayloadTooLarge(msg) => {
                ResponseEnvelope::error("Payload too large").with_error(msg)
            }
        };

        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Validation(FieldErrors::default()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(StorageError::NoData).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::MalformedBody("x".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unauthorized_response() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
