//! HTTP error mapping
//!
//! Every failure leaves the service as
//! `{"success": false, "kind": "<KIND>", "error": "<message>"}`.
//! Store and generator failures are logged and answered with a fixed message;
//! their details never reach the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::application::AuthError;
use crate::domain::DomainError;

/// Error body shared by all endpoints
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`
    pub success: bool,
    /// Machine-readable kind, e.g. `KEY_NOT_FOUND`
    pub kind: String,
    /// Human-readable description
    pub error: String,
}

impl ErrorBody {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: kind.into(),
            error: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Deployment requires `?name=` on list requests.
    #[error("Query parameter 'name' is required")]
    FilterRequired,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) | Self::FilterRequired => StatusCode::UNAUTHORIZED,
            Self::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Domain(DomainError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Domain(DomainError::Conflict(_) | DomainError::Storage(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.kind(),
            Self::FilterRequired => "FILTER_REQUIRED",
            Self::Domain(DomainError::NotFound { field: "name", .. }) => "NAME_NOT_FOUND",
            Self::Domain(DomainError::NotFound { .. }) => "KEY_NOT_FOUND",
            Self::Domain(DomainError::Validation(_)) => "VALIDATION_ERROR",
            Self::Domain(DomainError::Conflict(_) | DomainError::Storage(_)) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Auth(AuthError::Store(_)) => INTERNAL_MESSAGE.to_string(),
            Self::Domain(DomainError::NotFound {
                field: "name",
                value,
                ..
            }) => format!("No API keys found with name: {}", value),
            Self::Domain(DomainError::NotFound { .. }) => "API key not found".to_string(),
            Self::Domain(DomainError::Validation(msg)) => msg.clone(),
            Self::Domain(DomainError::Conflict(_) | DomainError::Storage(_)) => {
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), "Request failed: {:?}", self);
        }
        (status, Json(ErrorBody::new(self.kind(), self.message()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_unauthorized() {
        for err in [
            AuthError::MissingCredential,
            AuthError::InvalidCredential,
            AuthError::ExpiredCredential,
        ] {
            assert_eq!(ApiError::from(err).status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(ApiError::FilterRequired.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn id_and_name_misses_are_distinct() {
        let by_id = ApiError::from(DomainError::key_not_found(7));
        let by_name = ApiError::from(DomainError::name_not_found("svc"));

        assert_eq!(by_id.status(), StatusCode::NOT_FOUND);
        assert_eq!(by_name.status(), StatusCode::NOT_FOUND);
        assert_eq!(by_id.kind(), "KEY_NOT_FOUND");
        assert_eq!(by_name.kind(), "NAME_NOT_FOUND");
        assert_eq!(by_name.message(), "No API keys found with name: svc");
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = ApiError::from(DomainError::Storage(
            "Database error: no such table: api_keys".to_string(),
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), INTERNAL_MESSAGE);

        let conflict = ApiError::from(DomainError::Conflict("dup".to_string()));
        assert_eq!(conflict.kind(), "INTERNAL_ERROR");
        assert_eq!(conflict.message(), INTERNAL_MESSAGE);
    }
}
