//! Application assembly: shared state and the composed router.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::auth::{AuthUser, TokenService};
use crate::books::{self, BookStore, MemoryBookStore};
use crate::config::Config;
use crate::error::{ApiError, Error};
use crate::health;
use crate::middleware::Trace;
use crate::request::Request;
use crate::router::{RouteError, Router};
use crate::users::{self, MemoryUserStore, UserStore};

/// Collaborators every handler can reach through the request extensions.
#[derive(Clone)]
pub struct AppState {
    pub books: Arc<dyn BookStore>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<TokenService>,
    /// Lower-cased emails that register as admins.
    pub admin_emails: Arc<BTreeSet<String>>,
}

impl AppState {
    /// In-memory stores, the catalogue file (if configured) and the token
    /// service described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let books = match &config.catalog.path {
            Some(path) => {
                let store = MemoryBookStore::from_json_file(path)?;
                info!(path = %path.display(), "catalog loaded");
                store
            }
            None => MemoryBookStore::default(),
        };
        let tokens = TokenService::new(
            config.auth.jwt_secret.as_bytes(),
            Duration::from_secs(config.auth.token_ttl_secs),
        );
        Ok(Self {
            books: Arc::new(books),
            users: Arc::new(MemoryUserStore::new()),
            tokens: Arc::new(tokens),
            admin_emails: Arc::new(config.auth.admin_emails.iter().map(|e| e.trim().to_lowercase()).collect()),
        })
    }
}

/// Fetches the [`AppState`] the router attached to `req`.
pub fn state(req: &Request) -> Result<&AppState, ApiError> {
    req.extension::<AppState>()
        .ok_or_else(|| ApiError::Internal("application state is not attached to the router".to_owned()))
}

/// `{"count": n}`
#[derive(Debug, Serialize)]
pub struct Count {
    pub count: usize,
}

/// Builds the full service router:
///
/// ```text
/// /healthz, /readyz   health probes
/// /books/...          catalogue, public
/// /users/...          accounts, partly authenticated
/// ```
pub fn build(state: AppState) -> Result<Router, RouteError> {
    let auth = AuthUser::new(state.tokens.clone());
    Router::builder()
        .layer(Trace::new())
        .merge(health::routes())
        .mount("/books", books::routes())
        .mount("/users", users::routes(auth))
        .extension(state)
        .build()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SECRET: &[u8] = b"test-secret-test-secret-test-secret";

    pub(crate) fn state_with(books: MemoryBookStore) -> AppState {
        AppState {
            books: Arc::new(books),
            users: Arc::new(MemoryUserStore::new()),
            tokens: Arc::new(TokenService::new(SECRET, Duration::from_secs(300))),
            admin_emails: Arc::new(BTreeSet::from(["admin@example.com".to_owned()])),
        }
    }

    #[test]
    fn full_route_table() {
        let router = build(state_with(MemoryBookStore::default())).unwrap();
        let listed: Vec<String> = router.routes().iter().map(|(m, p)| format!("{m} {p}")).collect();
        assert_eq!(listed, [
            "GET /healthz",
            "GET /readyz",
            "GET /books",
            "GET /books/categories",
            "GET /books/number",
            "GET /books/:id",
            "POST /users/register",
            "POST /users/login",
            "GET /users/profile",
            "GET /users/number",
        ]);
    }

    #[test]
    fn state_from_default_config_has_empty_catalog() {
        let mut config = Config::default();
        config.auth.jwt_secret = "0123456789abcdef".to_owned();
        assert!(AppState::from_config(&config).is_ok());
    }
}
