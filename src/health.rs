//! Kubernetes health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Both are mounted at the root by [`crate::app::build`].

use http::StatusCode;
use tracing::warn;

use crate::app::state;
use crate::router::{Route, RouteTable};
use crate::{Request, Response};

/// Always `200 OK` with body `"ok"`. No dependencies.
pub async fn liveness(_req: Request) -> Response {
    Response::text("ok")
}

/// `200 OK` with body `"ready"` once application state is attached and the
/// book store answers; `503` otherwise.
pub async fn readiness(req: Request) -> Response {
    let app = match state(&req) {
        Ok(app) => app,
        Err(_) => return Response::status(StatusCode::SERVICE_UNAVAILABLE),
    };
    match app.books.count().await {
        Ok(_) => Response::text("ready"),
        Err(e) => {
            warn!("book store not ready: {e}");
            Response::status(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

pub fn routes() -> RouteTable {
    RouteTable::new()
        .route(Route::get("/healthz", liveness))
        .route(Route::get("/readyz", readiness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;
    use bytes::Bytes;

    #[tokio::test]
    async fn readiness_needs_state() {
        let router = Router::builder().merge(routes()).build().unwrap();
        let get = |uri: &'static str| http::Request::get(uri).body(Bytes::new()).unwrap();

        assert_eq!(router.handle(get("/healthz")).await.status_code(), StatusCode::OK);
        assert_eq!(router.handle(get("/readyz")).await.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
