//! Error types.
//!
//! Two families live here. [`Error`] is returned by the fallible startup and
//! serving operations: loading configuration, validating the route table,
//! binding to a port. [`ApiError`] is a request-level failure; it never
//! escapes a handler as an `Err`, it is turned into an HTTP response through
//! [`IntoResponse`].

use std::path::PathBuf;

use http::StatusCode;
use serde::Serialize;
use tracing::error;

use crate::config::ConfigError;
use crate::response::{IntoResponse, Response};
use crate::router::RouteError;

/// The error type returned by bookstore's fallible startup operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("invalid bind address `{0}`")]
    InvalidAddress(String),

    #[error("catalog {}: {source}", .path.display())]
    Catalog {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("catalog contains book id {0} more than once")]
    DuplicateBookId(u64),
}

/// A failure reported by a book or user store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email `{0}` is already registered")]
    DuplicateEmail(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail(_) => ApiError::Conflict(e.to_string()),
        }
    }
}

/// A request-level failure, rendered as a JSON error body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Credentials are missing or could not be validated.
    #[error("{0}")]
    Unauthenticated(String),

    /// The authenticated identity lacks a required permission.
    #[error("missing permission `{permission}`")]
    Forbidden { permission: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    /// The request method is not one the server recognises.
    #[error("method `{0}` is not implemented")]
    NotImplemented(String),

    /// Something broke on our side. The message is logged, not sent.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_)  => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. }    => StatusCode::FORBIDDEN,
            Self::NotFound(_)         => StatusCode::NOT_FOUND,
            Self::BadRequest(_)       => StatusCode::BAD_REQUEST,
            Self::Conflict(_)         => StatusCode::CONFLICT,
            Self::NotImplemented(_)   => StatusCode::NOT_IMPLEMENTED,
            Self::Internal(_)         => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable kind, sent as the `error` field of the body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_)  => "unauthenticated",
            Self::Forbidden { .. }    => "forbidden",
            Self::NotFound(_)         => "not_found",
            Self::BadRequest(_)       => "bad_request",
            Self::Conflict(_)         => "conflict",
            Self::NotImplemented(_)   => "not_implemented",
            Self::Internal(_)         => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(detail) => {
                error!(%detail, "internal error");
                "internal server error".to_owned()
            }
            other => other.to_string(),
        };
        Response::builder()
            .status(self.status())
            .json(&ErrorBody { error: self.kind(), message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn body(resp: &Response) -> Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    #[test]
    fn forbidden_names_the_permission() {
        let resp = ApiError::Forbidden { permission: "select.user".into() }.into_response();
        assert_eq!(resp.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            body(&resp),
            json!({ "error": "forbidden", "message": "missing permission `select.user`" })
        );
    }

    #[test]
    fn unknown_methods_are_not_implemented() {
        let resp = ApiError::NotImplemented("PROPFIND".into()).into_response();
        assert_eq!(resp.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            body(&resp),
            json!({ "error": "not_implemented", "message": "method `PROPFIND` is not implemented" })
        );
    }

    #[test]
    fn internal_detail_is_not_sent() {
        let resp = ApiError::Internal("db password leaked".into()).into_response();
        assert_eq!(resp.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&resp)["message"], "internal server error");
    }
}
