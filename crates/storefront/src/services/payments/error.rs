//! Payment error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors from payment providers and the confirmation flow.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request to the provider failed (network, timeout, TLS).
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    /// Provider answered with a body we could not interpret.
    #[error("unexpected provider response: {0}")]
    Response(String),

    /// Provider returned an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Provider did not confirm the payment, or it does not match the order.
    #[error("payment rejected: {0}")]
    Rejected(String),

    /// Client could not be configured.
    #[error("payment configuration error: {0}")]
    Config(String),

    /// Order lookup or state change failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<gamevault_core::DomainError> for PaymentError {
    fn from(err: gamevault_core::DomainError) -> Self {
        Self::Repository(RepositoryError::Domain(err))
    }
}
