//! Route tables and the request router.
//!
//! Routes are declared as data: a [`RouteTable`] is an ordered list of
//! [`Route`] entries, each with its own middleware chain. Tables are mounted
//! under a prefix on a [`RouterBuilder`], and [`RouterBuilder::build`]
//! validates the combined table and freezes it into a [`Router`].
//!
//! Lookup uses one `matchit` radix tree per HTTP method, O(path-length).
//! Declared order still matters for validation: a literal path registered
//! after a parameter path that would capture it is rejected, so a table
//! reads top-to-bottom the way it is matched.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::Extensions;
use matchit::Router as MatchitRouter;
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::error::ApiError;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Endpoint, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Why a route table was rejected at startup.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("{method} {pattern} is registered twice")]
    Duplicate { method: Method, pattern: String },

    #[error("{method} {literal} is registered after {param}, which would capture it")]
    Shadowed { method: Method, literal: String, param: String },

    #[error("{method} {pattern} conflicts with an existing route: {source}")]
    Conflict {
        method: Method,
        pattern: String,
        source: matchit::InsertError,
    },
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// One entry of a route table: method, path pattern, middleware, handler.
///
/// Path parameters may be written `:id` or `{id}`.
pub struct Route {
    method: Method,
    path: String,
    chain: Vec<BoxedMiddleware>,
    handler: BoxedHandler,
}

impl Route {
    pub fn on(method: Method, path: &str, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.to_owned(),
            chain: Vec::new(),
            handler: handler.into_boxed_handler(),
        }
    }

    pub fn get(path: &str, handler: impl Handler) -> Self { Self::on(Method::Get, path, handler) }
    pub fn post(path: &str, handler: impl Handler) -> Self { Self::on(Method::Post, path, handler) }
    pub fn delete(path: &str, handler: impl Handler) -> Self { Self::on(Method::Delete, path, handler) }

    /// Appends a middleware step. Steps run in the order they are added.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.chain.push(Arc::new(middleware));
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
}

// ── RouteTable ────────────────────────────────────────────────────────────────

/// An ordered list of routes, usually one per resource.
///
/// ```rust
/// # use bookstore::{Request, Response, Route, RouteTable};
/// # async fn list(_: Request) -> Response { Response::text("") }
/// # async fn show(_: Request) -> Response { Response::text("") }
/// let table = RouteTable::new()
///     .route(Route::get("/", list))
///     .route(Route::get("/:id", show));
/// assert!(table.validate().is_ok());
/// ```
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Checks pattern syntax, duplicates and literal-after-parameter ordering.
    pub fn validate(&self) -> Result<(), RouteError> {
        let entries = self.routes.iter()
            .map(|r| Ok((r.method, Pattern::parse(&r.path)?)))
            .collect::<Result<Vec<_>, RouteError>>()?;
        check_order(&entries)
    }
}

// ── Pattern ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug)]
struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self, RouteError> {
        let invalid = |reason| RouteError::InvalidPattern { pattern: raw.to_owned(), reason };

        let rest = raw.strip_prefix('/').ok_or_else(|| invalid("must start with `/`"))?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self { raw: raw.to_owned(), segments: Vec::new() });
        }

        let segments = rest.split('/')
            .map(|seg| {
                let param = seg.strip_prefix(':')
                    .or_else(|| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')));
                match param {
                    Some("") => Err(invalid("empty parameter name")),
                    Some(name) if name.contains(['{', '}', ':', '*']) => {
                        Err(invalid("parameter names may only contain plain characters"))
                    }
                    Some(name) => Ok(Segment::Param(name.to_owned())),
                    None if seg.is_empty() => Err(invalid("empty path segment")),
                    None if seg.contains(['{', '}']) => Err(invalid("unexpected brace in literal segment")),
                    None => Ok(Segment::Literal(seg.to_owned())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { raw: raw.to_owned(), segments })
    }

    /// The same path in matchit's `{param}` syntax.
    fn to_matchit(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_owned();
        }
        self.segments.iter()
            .map(|seg| match seg {
                Segment::Literal(s) => format!("/{s}"),
                Segment::Param(name) => format!("/{{{name}}}"),
            })
            .collect()
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|pair| match pair {
                (Segment::Param(_), Segment::Param(_)) => true,
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                _ => false,
            })
    }

    /// True when every request `other` accepts is also accepted by `self`.
    fn covers(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|pair| match pair {
                (Segment::Param(_), _) => true,
                (Segment::Literal(a), Segment::Literal(b)) => a == b,
                (Segment::Literal(_), Segment::Param(_)) => false,
            })
    }
}

fn check_order(entries: &[(Method, Pattern)]) -> Result<(), RouteError> {
    for (i, (method, later)) in entries.iter().enumerate() {
        for (_, earlier) in entries[..i].iter().filter(|(m, _)| m == method) {
            if earlier.same_shape(later) {
                return Err(RouteError::Duplicate { method: *method, pattern: later.raw.clone() });
            }
            if earlier.covers(later) {
                return Err(RouteError::Shadowed {
                    method: *method,
                    literal: later.raw.clone(),
                    param: earlier.raw.clone(),
                });
            }
        }
    }
    Ok(())
}

fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match path {
        "/" if prefix.is_empty() => "/".to_owned(),
        "/" => prefix.to_owned(),
        _ => format!("{prefix}{path}"),
    }
}

// ── RouterBuilder ─────────────────────────────────────────────────────────────

/// Assembles route tables into a [`Router`].
#[derive(Default)]
pub struct RouterBuilder {
    mounts: Vec<(String, RouteTable)>,
    layers: Vec<BoxedMiddleware>,
    extensions: Extensions,
}

impl RouterBuilder {
    /// Mounts `table` under `prefix` (e.g. `"/books"`).
    pub fn mount(mut self, prefix: &str, table: RouteTable) -> Self {
        self.mounts.push((prefix.to_owned(), table));
        self
    }

    /// Adds `table` at the root.
    pub fn merge(self, table: RouteTable) -> Self {
        self.mount("", table)
    }

    /// Adds a step that runs before every route's own middleware.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Makes `value` available to every request via [`Request::extension`].
    pub fn extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    /// Validates the combined table and freezes it.
    pub fn build(self) -> Result<Router, RouteError> {
        let fallback = Arc::new(Endpoint {
            chain: self.layers.clone(),
            handler: unmatched.into_boxed_handler(),
        });
        let mut entries = Vec::new();
        let mut endpoints = Vec::new();
        for (prefix, table) in self.mounts {
            for route in table.routes {
                let pattern = Pattern::parse(&join(&prefix, &route.path))?;
                let mut chain = self.layers.clone();
                chain.extend(route.chain);
                endpoints.push(Arc::new(Endpoint { chain, handler: route.handler }));
                entries.push((route.method, pattern));
            }
        }
        check_order(&entries)?;

        let mut routes: HashMap<Method, MatchitRouter<Arc<Endpoint>>> = HashMap::new();
        let mut table = Vec::with_capacity(entries.len());
        for ((method, pattern), endpoint) in entries.into_iter().zip(endpoints) {
            routes.entry(method)
                .or_default()
                .insert(pattern.to_matchit(), endpoint)
                .map_err(|source| RouteError::Conflict {
                    method,
                    pattern: pattern.raw.clone(),
                    source,
                })?;
            debug!(%method, path = %pattern.raw, "route registered");
            table.push((method, pattern.raw));
        }

        Ok(Router { routes, table, fallback, extensions: self.extensions })
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The frozen application router.
///
/// Immutable once built; the server shares it across connections in an
/// `Arc`.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Arc<Endpoint>>>,
    table: Vec<(Method, String)>,
    /// Router-wide layers in front of [`unmatched`].
    fallback: Arc<Endpoint>,
    extensions: Extensions,
}

/// Answers requests no route accepts: `501` for a method the server does
/// not recognise, `404` otherwise.
async fn unmatched(req: Request) -> ApiError {
    match Method::try_from(req.method()) {
        Ok(method) => {
            debug!(%method, path = req.path(), "no route matched");
            ApiError::NotFound(format!("no route for {method} {}", req.path()))
        }
        Err(e) => ApiError::NotImplemented(e.0),
    }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Every registered (method, path) pair in declaration order.
    pub fn routes(&self) -> &[(Method, String)] {
        &self.table
    }

    /// True when `method path` would reach a handler.
    pub fn matches(&self, method: Method, path: &str) -> bool {
        self.lookup(method, path).is_some()
    }

    fn lookup(&self, method: Method, path: &str) -> Option<(Arc<Endpoint>, HashMap<String, String>)> {
        let tree = self.routes.get(&method)?;
        let matched = tree.at(path).ok().or_else(|| {
            let trimmed = path.trim_end_matches('/');
            (trimmed.len() != path.len() && !trimmed.is_empty())
                .then(|| tree.at(trimmed).ok())
                .flatten()
        })?;
        let endpoint = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), percent_decode_str(v).decode_utf8_lossy().into_owned()))
            .collect();
        Some((endpoint, params))
    }

    /// Routes one buffered request and produces one response.
    ///
    /// Requests no route accepts still pass through the router-wide layers
    /// before being answered with `404` (known method) or `501` (unknown
    /// method). Path parameters are percent-decoded.
    pub async fn handle(&self, req: http::Request<Bytes>) -> Response {
        let mut req = Request::from_http(req);

        let matched = Method::try_from(req.method())
            .ok()
            .and_then(|method| self.lookup(method, req.path()));
        let endpoint = match matched {
            Some((endpoint, params)) => {
                req.set_params(params);
                endpoint
            }
            None => Arc::clone(&self.fallback),
        };

        req.extensions_mut().extend(self.extensions.clone());
        Next::start(endpoint).run(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    async fn echo_id(req: Request) -> String {
        format!("id={}", req.param("id").unwrap_or("-"))
    }

    async fn named(_req: Request) -> &'static str {
        "named"
    }

    fn get(uri: &str) -> http::Request<Bytes> {
        http::Request::get(uri).body(Bytes::new()).unwrap()
    }

    async fn body_of(router: &Router, uri: &str) -> (StatusCode, String) {
        let resp = router.handle(get(uri)).await;
        (resp.status_code(), String::from_utf8(resp.body().to_vec()).unwrap())
    }

    fn lit(s: &str) -> Segment { Segment::Literal(s.to_owned()) }
    fn param(s: &str) -> Segment { Segment::Param(s.to_owned()) }

    #[rstest]
    #[case("/", vec![])]
    #[case("/books/", vec![lit("books")])]
    #[case("/books/:id", vec![lit("books"), param("id")])]
    #[case("/books/{id}/reviews", vec![lit("books"), param("id"), lit("reviews")])]
    fn parses_patterns(#[case] raw: &str, #[case] expected: Vec<Segment>) {
        assert_eq!(Pattern::parse(raw).unwrap().segments, expected);
    }

    #[test]
    fn matchit_syntax_uses_braces() {
        assert_eq!(Pattern::parse("/books/:id").unwrap().to_matchit(), "/books/{id}");
        assert_eq!(Pattern::parse("/").unwrap().to_matchit(), "/");
    }

    #[rstest]
    #[case("books")]
    #[case("/books//x")]
    #[case("/books/:")]
    #[case("/books/{id")]
    fn rejects_bad_patterns(#[case] raw: &str) {
        assert!(matches!(Pattern::parse(raw), Err(RouteError::InvalidPattern { .. })));
    }

    #[rstest]
    #[case("", "/", "/")]
    #[case("/books", "/", "/books")]
    #[case("/books/", "/:id", "/books/:id")]
    #[case("", "/healthz", "/healthz")]
    fn joins_prefixes(#[case] prefix: &str, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(join(prefix, path), expected);
    }

    #[test]
    fn literal_after_param_is_rejected() {
        let table = RouteTable::new()
            .route(Route::get("/:id", echo_id))
            .route(Route::get("/categories", named));
        let err = table.validate().unwrap_err();
        assert_eq!(err.to_string(), "GET /categories is registered after /:id, which would capture it");
    }

    #[test]
    fn same_path_different_methods_is_fine() {
        let table = RouteTable::new()
            .route(Route::get("/:id", echo_id))
            .route(Route::delete("/:id", echo_id))
            .route(Route::post("/number", named));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn duplicate_shape_is_rejected_across_mounts() {
        let err = Router::builder()
            .mount("/books", RouteTable::new().route(Route::get("/:id", echo_id)))
            .merge(RouteTable::new().route(Route::get("/books/{book}", echo_id)))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RouteError::Duplicate { method: Method::Get, .. }));
    }

    #[tokio::test]
    async fn literal_routes_win_over_params() {
        let router = Router::builder()
            .mount("/books", RouteTable::new()
                .route(Route::get("/number", named))
                .route(Route::get("/:id", echo_id)))
            .build()
            .unwrap();

        assert_eq!(body_of(&router, "/books/number").await, (StatusCode::OK, "named".into()));
        assert_eq!(body_of(&router, "/books/7").await, (StatusCode::OK, "id=7".into()));
    }

    #[tokio::test]
    async fn trailing_slash_reaches_the_same_route() {
        let router = Router::builder()
            .mount("/books", RouteTable::new().route(Route::get("/", named)))
            .build()
            .unwrap();

        assert_eq!(body_of(&router, "/books").await.0, StatusCode::OK);
        assert_eq!(body_of(&router, "/books/").await.0, StatusCode::OK);
        assert!(!router.matches(Method::Delete, "/books/"));
    }

    #[tokio::test]
    async fn unknown_method_and_path() {
        let router = Router::builder()
            .merge(RouteTable::new().route(Route::get("/", named)))
            .build()
            .unwrap();

        let resp = router.handle(
            http::Request::builder()
                .method(http::Method::from_bytes(b"PROPFIND").unwrap())
                .uri("/")
                .body(Bytes::new())
                .unwrap(),
        ).await;
        assert_eq!(resp.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(resp.header("allow"), None);
        assert_eq!(body_of(&router, "/nope").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn layers_see_unmatched_requests() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let router = Router::builder()
            .layer(crate::middleware::from_fn(move |req: Request, next: Next| {
                let log = Arc::clone(&log);
                async move {
                    let resp = next.run(req).await;
                    log.lock().unwrap().push(resp.status_code());
                    resp
                }
            }))
            .merge(RouteTable::new().route(Route::get("/", named)))
            .build()
            .unwrap();

        body_of(&router, "/").await;
        body_of(&router, "/nope").await;
        router.handle(
            http::Request::builder()
                .method(http::Method::from_bytes(b"PROPFIND").unwrap())
                .uri("/")
                .body(Bytes::new())
                .unwrap(),
        ).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![StatusCode::OK, StatusCode::NOT_FOUND, StatusCode::NOT_IMPLEMENTED]
        );
    }

    #[tokio::test]
    async fn path_params_are_percent_decoded() {
        let router = Router::builder()
            .mount("/books", RouteTable::new().route(Route::get("/:id", echo_id)))
            .build()
            .unwrap();

        assert_eq!(body_of(&router, "/books/%31").await.1, "id=1");
        assert_eq!(body_of(&router, "/books/a%20b").await.1, "id=a b");
        assert_eq!(body_of(&router, "/books/a+b").await.1, "id=a+b");
    }

    #[tokio::test]
    async fn extensions_reach_handlers() {
        #[derive(Clone)]
        struct Greeting(&'static str);

        async fn greet(req: Request) -> String {
            req.extension::<Greeting>().map(|g| g.0).unwrap_or("none").to_owned()
        }

        let router = Router::builder()
            .merge(RouteTable::new().route(Route::get("/", greet)))
            .extension(Greeting("hello"))
            .build()
            .unwrap();
        assert_eq!(body_of(&router, "/").await.1, "hello");
    }

    #[test]
    fn routes_are_listed_in_declaration_order() {
        let router = Router::builder()
            .mount("/books", RouteTable::new()
                .route(Route::get("/", named))
                .route(Route::get("/:id", echo_id)))
            .build()
            .unwrap();
        assert_eq!(
            router.routes(),
            &[(Method::Get, "/books".to_owned()), (Method::Get, "/books/:id".to_owned())]
        );
    }
}
