//! Caller identity extractors.
//!
//! Authentication happens upstream. The gateway forwards the authenticated
//! user as `X-User-Id` and, for staff, `X-User-Role: admin`. Handlers take
//! [`RequireCaller`] or [`RequireAdmin`] to obtain a [`Caller`].

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use gamevault_core::{Caller, CallerRole, UserId};

use crate::error::set_sentry_user;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor that requires a forwarded caller identity.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireCaller(caller): RequireCaller) -> impl IntoResponse {
///     format!("Hello, user {}!", caller.user_id)
/// }
/// ```
pub struct RequireCaller(pub Caller);

/// Extractor that requires an admin caller.
pub struct RequireAdmin(pub Caller);

/// Rejection for missing or insufficient identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRejection {
    /// No usable `X-User-Id` header.
    Unauthorized,
    /// Identity present but not an admin.
    Forbidden,
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid X-User-Id header",
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "permission_denied",
                "admin role required",
            ),
        };
        (status, Json(json!({ "error": error, "message": message }))).into_response()
    }
}

/// Parse the forwarded identity headers.
///
/// # Errors
///
/// Returns `IdentityRejection::Unauthorized` when the user id is missing,
/// not an integer, or not positive.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, IdentityRejection> {
    let user_id: UserId = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .filter(|id: &UserId| id.as_i64() > 0)
        .ok_or(IdentityRejection::Unauthorized)?;

    let role = match headers.get(USER_ROLE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(role) if role.trim().eq_ignore_ascii_case("admin") => CallerRole::Admin,
        _ => CallerRole::Customer,
    };

    Ok(Caller { user_id, role })
}

impl<S> FromRequestParts<S> for RequireCaller
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller = caller_from_headers(&parts.headers)?;
        set_sentry_user(&caller.user_id);
        Ok(Self(caller))
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireCaller(caller) = RequireCaller::from_request_parts(parts, state).await?;
        if !caller.is_admin() {
            return Err(IdentityRejection::Forbidden);
        }
        Ok(Self(caller))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_customer_identity() {
        let caller = caller_from_headers(&headers(&[(USER_ID_HEADER, "42")])).unwrap();
        assert_eq!(caller, Caller::customer(UserId::new(42)));
    }

    #[test]
    fn test_admin_identity() {
        let caller =
            caller_from_headers(&headers(&[(USER_ID_HEADER, "7"), (USER_ROLE_HEADER, "Admin")]))
                .unwrap();
        assert!(caller.is_admin());
    }

    #[test]
    fn test_unknown_role_is_customer() {
        let caller =
            caller_from_headers(&headers(&[(USER_ID_HEADER, "7"), (USER_ROLE_HEADER, "root")]))
                .unwrap();
        assert!(!caller.is_admin());
    }

    #[test]
    fn test_missing_or_invalid_id() {
        assert_eq!(
            caller_from_headers(&HeaderMap::new()),
            Err(IdentityRejection::Unauthorized)
        );
        assert_eq!(
            caller_from_headers(&headers(&[(USER_ID_HEADER, "abc")])),
            Err(IdentityRejection::Unauthorized)
        );
        assert_eq!(
            caller_from_headers(&headers(&[(USER_ID_HEADER, "0")])),
            Err(IdentityRejection::Unauthorized)
        );
    }
}
