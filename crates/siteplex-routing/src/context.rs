//! Request extensions set by the dispatch handler

use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;
use siteplex_core::Site;

use crate::handler::SitesHandler;

/// The site serving the current request
#[derive(Clone, Debug)]
pub struct CurrentSite(pub Arc<Site>);

/// Mount prefix of the router that dispatched the request (`/` when unset)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootPath(pub String);

/// Prefix stripped from the path when the site was resolved by path,
/// for example `/sites/shop`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SitePrefix(pub String);

/// Set once a request is inside a request-log middleware
#[derive(Clone, Copy, Debug, Default)]
pub struct SkipRequestLog;

/// Set once a request is inside a recovery middleware
#[derive(Clone, Copy, Debug, Default)]
pub struct SkipRecovery;

/// Lets nested handlers hand a request to another site through the same
/// middleware chain
#[derive(Clone)]
pub struct SiteHandlerExt(pub(crate) SitesHandler);

impl SiteHandlerExt {
    pub async fn dispatch(&self, site: Arc<Site>, req: Request) -> Response {
        self.0.dispatch(site, req).await
    }
}

pub fn current_site(req: &Request) -> Option<Arc<Site>> {
    req.extensions().get::<CurrentSite>().map(|c| c.0.clone())
}

pub fn root_path(req: &Request) -> &str {
    req.extensions()
        .get::<RootPath>()
        .map(|p| p.0.as_str())
        .unwrap_or("/")
}

pub fn site_prefix(req: &Request) -> Option<&str> {
    req.extensions().get::<SitePrefix>().map(|p| p.0.as_str())
}
