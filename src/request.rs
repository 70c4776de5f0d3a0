//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// An incoming HTTP request with its body fully buffered.
///
/// Middleware communicates with later steps through [`extensions`]: the
/// authentication step stores the caller's identity there, the router stores
/// application state there.
///
/// [`extensions`]: Request::extensions
pub struct Request {
    parts: Parts,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    /// Wraps a buffered `http::Request`. Path parameters start empty; the
    /// router fills them in after matching.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self { parts, body, params: HashMap::new() }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> &http::Method { &self.parts.method }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn query(&self) -> Option<&str> { self.parts.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/books/:id`, `req.param("id")` on `/books/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Decoded query-string pairs. A repeated key keeps its last value.
    pub fn query_pairs(&self) -> HashMap<String, String> {
        self.query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }

    /// Deserialises the body as JSON, mapping failures to `400 Bad Request`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::BadRequest(format!("invalid json body: {e}")))
    }

    pub fn extensions(&self) -> &Extensions { &self.parts.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.parts.extensions }

    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.parts.extensions.get::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn request(uri: &str, body: &'static str) -> Request {
        Request::from_http(
            http::Request::builder()
                .uri(uri)
                .header("Authorization", "Bearer abc")
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap(),
        )
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = request("/", "");
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn query_pairs_are_decoded() {
        let req = request("/books?category=science%20fiction&page=2", "");
        let pairs = req.query_pairs();
        assert_eq!(pairs["category"], "science fiction");
        assert_eq!(pairs["page"], "2");
        assert_eq!(req.path(), "/books");
    }

    #[test]
    fn json_body_errors_are_bad_requests() {
        #[derive(Deserialize)]
        struct Login {
            #[allow(dead_code)]
            email: String,
        }

        assert!(request("/", r#"{"email":"a@b.c"}"#).json::<Login>().is_ok());
        let err = request("/", "{").json::<Login>().err().unwrap();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
