//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses are JSON bodies of the form `{"error": "<kind>", "message": "..."}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use gamevault_core::DomainError;

use crate::db::RepositoryError;
use crate::services::InvoiceError;
use crate::services::payments::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// A business rule rejected the request.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Payment provider failed or rejected the payment.
    #[error("Payment error: {0}")]
    Payment(PaymentError),

    /// Invoice could not be rendered.
    #[error("Invoice error: {0}")]
    Invoice(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Domain(domain) => Self::Domain(domain),
            RepositoryError::NotFound => Self::NotFound("resource not found".to_owned()),
            RepositoryError::Conflict(message) => {
                Self::Domain(DomainError::InvalidState(message))
            }
            other => Self::Database(other),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Repository(repo) => repo.into(),
            other => Self::Payment(other),
        }
    }
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::Repository(repo) => repo.into(),
            InvoiceError::Render(message) => Self::Invoice(message),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl AppError {
    /// Machine-readable error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Invoice(_) => "internal_error",
            Self::Domain(err) => err.code(),
            Self::Payment(_) => "upstream_payment_failure",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "validation_error",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Invoice(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Domain(err) => match err {
                DomainError::Validation(_) => StatusCode::BAD_REQUEST,
                DomainError::InsufficientStock { .. } | DomainError::InvalidState(_) => {
                    StatusCode::CONFLICT
                }
                DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                DomainError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            },
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Database(_) | Self::Invoice(_) | Self::Payment(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Invoice(_) => {
                "Internal server error".to_string()
            }
            Self::Payment(PaymentError::Rejected(reason)) => reason.clone(),
            Self::Payment(_) => "Payment provider error".to_string(),
            Self::Domain(err) => err.to_string(),
            Self::NotFound(what) | Self::BadRequest(what) => what.clone(),
        };

        let body = ErrorBody {
            error: self.code(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called by the identity extractor so errors are associated with callers.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            get_status(DomainError::Validation("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(DomainError::insufficient_stock("Celeste").into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(DomainError::InvalidState("x".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(DomainError::NotFound("x".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(DomainError::PermissionDenied("x".into()).into()),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_repository_errors_lift_domain_kinds() {
        let err: AppError = RepositoryError::Domain(DomainError::insufficient_stock("Hades")).into();
        assert!(matches!(err, AppError::Domain(DomainError::InsufficientStock { .. })));

        let err: AppError = RepositoryError::NotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: AppError = RepositoryError::DataCorruption("bad row".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_payment_errors_are_bad_gateway() {
        let err: AppError = PaymentError::Rejected("declined".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "upstream_payment_failure");

        let err: AppError = PaymentError::Repository(RepositoryError::NotFound).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response =
            AppError::Database(RepositoryError::DataCorruption("secret detail".into()))
                .into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], "internal_error");
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::{Request, header};

        let request = Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"quantity\": "))
            .unwrap();
        let rejection = axum::Json::<serde_json::Value>::from_request(request, &())
            .await
            .unwrap_err();

        let response = AppError::from(rejection).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_domain_message_is_returned() {
        let response = AppError::from(DomainError::insufficient_stock("Celeste")).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], "insufficient_stock");
        assert!(json["message"].as_str().unwrap().contains("Celeste"));
    }
}
