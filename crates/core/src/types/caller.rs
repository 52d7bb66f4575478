//! Caller identity passed explicitly into every operation.

use serde::{Deserialize, Serialize};

use crate::{DomainError, UserId};

/// Role of the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    #[default]
    Customer,
    Admin,
}

/// The authenticated identity performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: CallerRole,
}

impl Caller {
    #[must_use]
    pub const fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: CallerRole::Customer,
        }
    }

    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: CallerRole::Admin,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == CallerRole::Admin
    }

    /// Whether the caller owns a record with the given owner.
    #[must_use]
    pub fn owns(&self, owner: Option<UserId>) -> bool {
        owner == Some(self.user_id)
    }

    /// Whether the caller may read a record with the given owner.
    #[must_use]
    pub fn can_view(&self, owner: Option<UserId>) -> bool {
        self.is_admin() || self.owns(owner)
    }

    /// # Errors
    ///
    /// Returns `DomainError::PermissionDenied` for non-admin callers.
    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::PermissionDenied("admin role required".to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_and_visibility() {
        let customer = Caller::customer(UserId::new(1));
        let admin = Caller::admin(UserId::new(99));

        assert!(customer.owns(Some(UserId::new(1))));
        assert!(!customer.owns(Some(UserId::new(2))));
        assert!(!customer.owns(None));

        assert!(admin.can_view(Some(UserId::new(1))));
        assert!(!admin.owns(Some(UserId::new(1))));
    }

    #[test]
    fn test_require_admin() {
        assert!(Caller::admin(UserId::new(1)).require_admin().is_ok());
        assert!(matches!(
            Caller::customer(UserId::new(1)).require_admin(),
            Err(DomainError::PermissionDenied(_))
        ));
    }
}
