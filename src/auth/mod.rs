//! Authentication and authorization.
//!
//! ```text
//! Unauthenticated ─[AuthUser]─▶ Authenticated ─[Authorize(perm)]─▶ Authorized ─▶ handler
//!        │                              │
//!        └─▶ 401                        └─▶ 403
//! ```
//!
//! [`AuthUser`] reads a bearer token, asks an [`Authenticator`] for the
//! caller's [`Identity`] and stores it in the request extensions.
//! [`Authorize`] checks that identity for one permission string.

mod middleware;
pub mod password;
mod token;

pub use middleware::{AuthUser, Authorize};
pub use token::{Claims, IssuedToken, TokenService};

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Permission required to read user statistics.
pub const SELECT_USER: &str = "select.user";

/// Who is calling, as established by the authentication step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: u64,
    pub email: String,
    permissions: BTreeSet<String>,
}

impl Identity {
    pub fn new<I, S>(user_id: u64, email: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id,
            email: email.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn permissions(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }
}

/// Account role. Each role grants a fixed set of permissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn permissions(self) -> &'static [&'static str] {
        match self {
            Self::Customer => &[],
            Self::Admin => &[SELECT_USER],
        }
    }
}

/// Why a request could not be authenticated.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingCredentials,

    #[error("authorization header is not a bearer token")]
    MalformedHeader,

    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Signing(_) => ApiError::Internal(e.to_string()),
            AuthError::InvalidToken(_) => ApiError::Unauthenticated("invalid token".to_owned()),
            other => ApiError::Unauthenticated(other.to_string()),
        }
    }
}

/// Turns presented credentials into an [`Identity`].
///
/// Implementations may suspend (e.g. look the caller up in a store).
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn authenticate(&self, credentials: &str) -> Result<Identity, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_hold_select_user() {
        let admin = Identity::new(1, "a@b.c", Role::Admin.permissions().iter().copied());
        let customer = Identity::new(2, "c@b.c", Role::Customer.permissions().iter().copied());
        assert!(admin.has_permission(SELECT_USER));
        assert!(!customer.has_permission(SELECT_USER));
    }

    #[test]
    fn invalid_token_detail_is_not_exposed() {
        let err = jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature);
        match ApiError::from(AuthError::InvalidToken(err)) {
            ApiError::Unauthenticated(msg) => assert_eq!(msg, "invalid token"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
