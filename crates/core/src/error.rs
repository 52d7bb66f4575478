//! Domain error kinds.
//!
//! These are business-rule failures. They never carry I/O errors; storage and
//! provider failures are wrapped by the storefront crate.

use thiserror::Error;

/// A business rule rejected the operation. No state was changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Malformed or out-of-range input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Not enough units of a game to satisfy the request.
    #[error("insufficient stock for {game}")]
    InsufficientStock {
        /// Name of the game that ran out.
        game: String,
    },

    /// The entity is not in a state that allows the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The entity does not exist or is not visible to the caller.
    #[error("{0} not found")]
    NotFound(String),

    /// The caller is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::InsufficientStock`].
    #[must_use]
    pub fn insufficient_stock(game: impl Into<String>) -> Self {
        Self::InsufficientStock { game: game.into() }
    }

    /// Stable machine-readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InvalidState(_) => "invalid_state",
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
        }
    }
}
