//! Middleware layer.
//!
//! A middleware step sits between the router and a route's handler. It
//! receives the request and a [`Next`] handle; it either answers on its own
//! (short-circuits) or calls [`Next::run`] to hand the request to the
//! following step. Steps run in the order they were attached, and a step
//! never starts before the previous one has decided to continue.
//!
//! ```text
//! Router ─▶ Trace ─▶ AuthUser ─▶ Authorize("select.user") ─▶ handler
//!                       │                 │
//!                       └─▶ 401           └─▶ 403
//! ```
//!
//! Implement [`Middleware`] on a struct when the step carries configuration,
//! or wrap an `async fn(Request, Next)` with [`from_fn`].

mod trace;

pub use trace::Trace;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::IntoResponse;

/// A step in a route's request pipeline.
pub trait Middleware: Send + Sync + 'static {
    /// Processes `req`. Call `next.run(req)` to continue down the chain.
    ///
    /// The returned future must own everything it touches; clone any state
    /// out of `self` before boxing it.
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// A resolved route: its middleware chain and terminal handler.
pub(crate) struct Endpoint {
    pub(crate) chain: Vec<BoxedMiddleware>,
    pub(crate) handler: BoxedHandler,
}

/// The remainder of a route's pipeline.
pub struct Next {
    endpoint: Arc<Endpoint>,
    index: usize,
}

impl Next {
    pub(crate) fn start(endpoint: Arc<Endpoint>) -> Self {
        Self { endpoint, index: 0 }
    }

    /// Runs the next middleware step, or the handler when the chain is done.
    pub fn run(self, req: Request) -> BoxFuture {
        match self.endpoint.chain.get(self.index).cloned() {
            Some(step) => {
                let next = Self { endpoint: self.endpoint, index: self.index + 1 };
                step.call(req, next)
            }
            None => self.endpoint.handler.call(req),
        }
    }
}

/// Adapts an `async fn(Request, Next) -> impl IntoResponse` into a [`Middleware`].
///
/// ```rust
/// use bookstore::middleware::{self, Next};
/// use bookstore::{Request, Response};
///
/// async fn deny_bots(req: Request, next: Next) -> Response {
///     if req.header("user-agent").is_some_and(|ua| ua.contains("bot")) {
///         return Response::status(http::StatusCode::FORBIDDEN);
///     }
///     next.run(req).await
/// }
///
/// let step = middleware::from_fn(deny_bots);
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F> {
    FromFn(f)
}

/// Middleware built by [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut, R> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let fut = (self.0)(req, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::response::Response;
    use bytes::Bytes;
    use http::StatusCode;
    use std::sync::Mutex;

    fn log_step(
        log: Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> BoxedMiddleware {
        Arc::new(from_fn(move |req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(name);
                next.run(req).await
            }
        }))
    }

    fn endpoint(chain: Vec<BoxedMiddleware>, log: Arc<Mutex<Vec<&'static str>>>) -> Arc<Endpoint> {
        let handler = move |_req: Request| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("handler");
                Response::text("done")
            }
        };
        Arc::new(Endpoint { chain, handler: handler.into_boxed_handler() })
    }

    fn empty_request() -> Request {
        Request::from_http(http::Request::new(Bytes::new()))
    }

    #[tokio::test]
    async fn steps_run_in_declared_order_then_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![log_step(Arc::clone(&log), "first"), log_step(Arc::clone(&log), "second")];
        let resp = Next::start(endpoint(chain, Arc::clone(&log))).run(empty_request()).await;

        assert_eq!(resp.status_code(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "handler"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stop: BoxedMiddleware = Arc::new(from_fn(|_req: Request, _next: Next| async {
            StatusCode::UNAUTHORIZED
        }));
        let chain = vec![stop, log_step(Arc::clone(&log), "after")];
        let resp = Next::start(endpoint(chain, Arc::clone(&log))).run(empty_request()).await;

        assert_eq!(resp.status_code(), StatusCode::UNAUTHORIZED);
        assert!(log.lock().unwrap().is_empty());
    }
}
