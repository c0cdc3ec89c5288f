//! Standard site middlewares
//!
//! Installed on every site when it is added to a router's registry:
//! request logging first (outermost), then panic recovery. Each marks the
//! request so that nested routers do not log or recover twice.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{OriginalUri, Request};
use axum::response::Response;
use futures::FutureExt;
use http::StatusCode;
use siteplex_core::{Middleware, RequestLogEntry, RequestLogFormatter, Site, call_handler};
use tracing::{error, info};

use crate::context::{SkipRecovery, SkipRequestLog};

pub const REQUEST_LOG: &str = "siteplex.request-log";
pub const RECOVER: &str = "siteplex.recover";

/// Default access log line on the `siteplex::http` target
pub fn default_request_log(entry: &RequestLogEntry<'_>) {
    info!(
        target: "siteplex::http",
        site = entry.site,
        method = %entry.method,
        uri = %entry.uri,
        status = entry.status.as_u16(),
        latency_ms = entry.latency.as_secs_f64() * 1000.0,
        "{} {} {}",
        entry.method,
        entry.uri,
        entry.status.as_u16()
    );
}

/// Request logging around the site handler
///
/// Uses the site's own formatter when it has one.
pub fn request_log(site: &Site) -> Middleware {
    let site_name: Arc<str> = Arc::from(site.name());
    let formatter: Arc<dyn RequestLogFormatter> = match site.request_log_formatter() {
        Some(formatter) => formatter,
        None => Arc::new(default_request_log),
    };

    Middleware::from_fn(REQUEST_LOG, move |mut req: Request, next| {
        let site_name = site_name.clone();
        let formatter = formatter.clone();
        async move {
            if req.extensions().get::<SkipRequestLog>().is_some() {
                return call_handler(next, req).await;
            }
            req.extensions_mut().insert(SkipRequestLog);

            let method = req.method().clone();
            let uri = req
                .extensions()
                .get::<OriginalUri>()
                .map(|original| original.0.clone())
                .unwrap_or_else(|| req.uri().clone());
            let start = Instant::now();

            let res = call_handler(next, req).await;

            formatter.log(&RequestLogEntry {
                site: &site_name,
                method: &method,
                uri: &uri,
                status: res.status(),
                latency: start.elapsed(),
            });
            res
        }
    })
}

/// Turn handler panics into `500 Internal Server Error`
pub fn recover(site: &Site) -> Middleware {
    let site_name: Arc<str> = Arc::from(site.name());

    Middleware::from_fn(RECOVER, move |mut req: Request, next| {
        let site_name = site_name.clone();
        async move {
            if req.extensions().get::<SkipRecovery>().is_some() {
                return call_handler(next, req).await;
            }
            req.extensions_mut().insert(SkipRecovery);

            let method = req.method().clone();
            let uri = req.uri().clone();

            match AssertUnwindSafe(call_handler(next, req)).catch_unwind().await {
                Ok(res) => res,
                Err(panic) => {
                    error!(
                        "[{}] panic while serving {} {}: {}",
                        site_name,
                        method,
                        uri,
                        panic_message(panic.as_ref())
                    );
                    let mut res = Response::new(Body::from("Internal Server Error"));
                    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    res
                }
            }
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteplex_core::{BoxHandler, handler_fn};
    use std::sync::Mutex;

    fn site_with(handler: BoxHandler) -> Site {
        Site::builder("shop").handler(handler).build().unwrap()
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl RequestLogFormatter for Recorder {
        fn log(&self, entry: &RequestLogEntry<'_>) {
            self.0.lock().unwrap().push(format!(
                "{} {} {}",
                entry.site,
                entry.uri,
                entry.status.as_u16()
            ));
        }
    }

    #[tokio::test]
    async fn test_recover_turns_panic_into_500() {
        let site = site_with(handler_fn(|_req| async {
            if true {
                panic!("boom");
            }
            Response::new(Body::empty())
        }));
        site.middlewares().push(recover(&site)).unwrap();

        let res = site.serve(Request::new(Body::empty())).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_request_log_uses_site_formatter() {
        let recorder = Recorder::default();
        let site = Site::builder("shop")
            .handler(handler_fn(|_req| async { Response::new(Body::from("ok")) }))
            .request_log_formatter(recorder.clone())
            .build()
            .unwrap();
        site.middlewares().push(request_log(&site)).unwrap();

        let req = Request::builder().uri("/cart").body(Body::empty()).unwrap();
        let res = site.serve(req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(*recorder.0.lock().unwrap(), vec!["shop /cart 200"]);
    }

    #[tokio::test]
    async fn test_request_log_skipped_when_already_logged() {
        let recorder = Recorder::default();
        let site = Site::builder("shop")
            .handler(handler_fn(|_req| async { Response::new(Body::empty()) }))
            .request_log_formatter(recorder.clone())
            .build()
            .unwrap();
        site.middlewares().push(request_log(&site)).unwrap();

        let mut req = Request::new(Body::empty());
        req.extensions_mut().insert(SkipRequestLog);
        site.serve(req).await;

        assert!(recorder.0.lock().unwrap().is_empty());
    }
}
