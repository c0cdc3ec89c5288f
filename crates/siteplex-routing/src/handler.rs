//! Dispatch handler
//!
//! [`SitesHandler`] is the HTTP entry point. It resolves the site for a
//! request, rewrites the path for path-mounted sites and runs the router
//! middleware chain around the site's own entry point.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{OriginalUri, Request};
use axum::response::Response;
use http::uri::PathAndQuery;
use http::{HeaderValue, StatusCode, Uri, header};
use siteplex_core::{BoxHandler, MiddlewareChain, Site, call_handler, handler_fn};
use tower::Service;
use tracing::{error, warn};

use crate::context::{CurrentSite, RootPath, SiteHandlerExt, SitePrefix};
use crate::resolver::{Resolution, Resolver};
use crate::router::RouterInner;

/// Dispatches requests to sites; built by [`SitesRouter`](crate::SitesRouter)
#[derive(Clone)]
pub struct SitesHandler {
    router: Arc<RouterInner>,
    chain: MiddlewareChain,
    alone: bool,
}

impl SitesHandler {
    pub(crate) fn new(router: Arc<RouterInner>, chain: MiddlewareChain, alone: bool) -> Self {
        Self {
            router,
            chain,
            alone,
        }
    }

    pub fn is_alone(&self) -> bool {
        self.alone
    }

    /// Serve a request, falling back to the not-found handler
    pub async fn serve(&self, req: Request) -> Response {
        match self.try_serve(req).await {
            Ok(res) => res,
            Err(req) => {
                let not_found = self.not_found();
                call_handler(not_found, req).await
            }
        }
    }

    /// Serve a request if it resolves to a site, a redirect or the index
    ///
    /// Hands the request back when nothing matched.
    pub async fn try_serve(&self, mut req: Request) -> Result<Response, Request> {
        let root = match self.router.options.mount_prefix() {
            "" => "/".to_string(),
            prefix => prefix.to_string(),
        };
        req.extensions_mut().insert(RootPath(root));
        req.extensions_mut().insert(SiteHandlerExt(self.clone()));

        let index = self.index();
        let resolution = Resolver {
            registry: &self.router.registry,
            options: &self.router.options,
            has_index: index.is_some(),
            alone: self.alone,
        }
        .resolve(request_host(&req).as_deref(), req.uri());

        match resolution {
            Resolution::Site { site, prefix, path } => {
                if req.extensions().get::<OriginalUri>().is_none() {
                    let original = OriginalUri(req.uri().clone());
                    req.extensions_mut().insert(original);
                }
                if let Some(prefix) = prefix {
                    let uri = replace_path(req.uri(), &path);
                    *req.uri_mut() = uri;
                    req.extensions_mut().insert(SitePrefix(prefix));
                }
                Ok(self.dispatch(site, req).await)
            }
            Resolution::Redirect { status, location } => Ok(redirect(status, &location)),
            Resolution::Index => match index {
                Some(index) => Ok(call_handler(index, req).await),
                None => Err(req),
            },
            Resolution::NotFound => Err(req),
            Resolution::NoSite => {
                error!("No site registered for alone mode, {} {}", req.method(), req.uri());
                let mut res = Response::new(Body::from("no site registered"));
                *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                Ok(res)
            }
        }
    }

    /// Run the router middleware chain around `site`
    pub async fn dispatch(&self, site: Arc<Site>, mut req: Request) -> Response {
        req.extensions_mut().insert(CurrentSite(site.clone()));

        let terminal = handler_fn(move |req: Request| {
            let site = site.clone();
            async move { site.serve(req).await }
        });
        call_handler(self.chain.handler(terminal), req).await
    }

    fn index(&self) -> Option<BoxHandler> {
        self.router
            .index
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn not_found(&self) -> BoxHandler {
        self.router
            .not_found
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Service<Request> for SitesHandler {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.serve(req).await) })
    }
}

/// Host header, or the URI authority for absolute-form requests
fn request_host(req: &Request) -> Option<String> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()))
}

fn replace_path(uri: &Uri, path: &str) -> Uri {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    match PathAndQuery::try_from(path_and_query) {
        Ok(pq) => parts.path_and_query = Some(pq),
        Err(e) => {
            warn!("Keeping request path {:?}: {}", uri.path(), e);
            return uri.clone();
        }
    }
    Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
}

fn redirect(status: StatusCode, location: &str) -> Response {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = status;
    match HeaderValue::try_from(location) {
        Ok(value) => {
            res.headers_mut().insert(header::LOCATION, value);
        }
        Err(e) => {
            warn!("Invalid redirect location {:?}: {}", location, e);
            *res.status_mut() = StatusCode::BAD_REQUEST;
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_path_keeps_query_and_authority() {
        let uri: Uri = "http://example.com/shop/cart?x=1".parse().unwrap();
        let rewritten = replace_path(&uri, "/cart");
        assert_eq!(rewritten.to_string(), "http://example.com/cart?x=1");

        let uri: Uri = "/shop/".parse().unwrap();
        assert_eq!(replace_path(&uri, "/").to_string(), "/");
    }

    #[test]
    fn test_redirect_sets_location() {
        let res = redirect(StatusCode::SEE_OTHER, "/shop/");
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/shop/");
    }
}
