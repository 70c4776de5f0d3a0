use std::sync::Arc;

use http::header::AUTHORIZATION;
use tracing::{debug, warn};

use super::{AuthError, Authenticator, Identity};
use crate::error::ApiError;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::IntoResponse;

/// Requires valid bearer credentials and attaches the caller's [`Identity`]
/// to the request.
#[derive(Clone)]
pub struct AuthUser {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthUser {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

fn bearer_token(req: &Request) -> Result<&str, AuthError> {
    let value = req.header(AUTHORIZATION.as_str()).ok_or(AuthError::MissingCredentials)?;
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

impl Middleware for AuthUser {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let authenticator = Arc::clone(&self.authenticator);
        Box::pin(async move {
            let token = match bearer_token(&req) {
                Ok(token) => token.to_owned(),
                Err(e) => return ApiError::from(e).into_response(),
            };
            match authenticator.authenticate(&token).await {
                Ok(identity) => {
                    debug!(user_id = identity.user_id, "authenticated");
                    req.extensions_mut().insert(identity);
                    next.run(req).await
                }
                Err(e) => {
                    warn!(path = req.path(), "authentication failed: {e}");
                    ApiError::from(e).into_response()
                }
            }
        })
    }
}

/// Requires the authenticated identity to hold one permission.
///
/// Must follow [`AuthUser`] in the chain; without an identity the request
/// is answered as unauthenticated.
#[derive(Clone, Debug)]
pub struct Authorize {
    permission: Arc<str>,
}

impl Authorize {
    pub fn new(permission: &str) -> Self {
        Self { permission: Arc::from(permission) }
    }
}

impl Middleware for Authorize {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let permission = Arc::clone(&self.permission);
        Box::pin(async move {
            let Some(identity) = req.extension::<Identity>() else {
                return ApiError::Unauthenticated("authentication required".to_owned()).into_response();
            };
            if !identity.has_permission(&permission) {
                warn!(user_id = identity.user_id, permission = &*permission, "permission denied");
                return ApiError::Forbidden { permission: permission.to_string() }.into_response();
            }
            next.run(req).await
        })
    }
}
