//! Per-request span with method, path, status and latency.

use std::time::Instant;

use tracing::{Instrument, info, info_span, warn};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

/// Opens an `http.request` span around the rest of the chain and logs one
/// line per completed request.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Trace {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Trace {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let span = info_span!("http.request", method = %req.method(), path = req.path());
        Box::pin(
            async move {
                let started = Instant::now();
                let resp = next.run(req).await;
                let status = resp.status_code().as_u16();
                let latency_ms = started.elapsed().as_millis() as u64;
                if resp.status_code().is_server_error() {
                    warn!(status, latency_ms, "request failed");
                } else {
                    info!(status, latency_ms, "request completed");
                }
                resp
            }
            .instrument(span),
        )
    }
}
