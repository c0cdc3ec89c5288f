//! Siteplex Routing
//!
//! Resolves each request to a site by host or path and dispatches it
//! through the router middleware chain:
//! - [`SitesRouter`]: options, registry wiring and handler construction
//! - [`SitesHandler`]: the tower `Service` mounted on the listener
//! - [`SitesIndex`]: built-in site chooser page

pub mod context;
pub mod error;
pub mod handler;
pub mod index;
pub mod middleware;
pub mod resolver;
pub mod router;

pub use context::{
    CurrentSite, RootPath, SiteHandlerExt, SitePrefix, SkipRecovery, SkipRequestLog,
    current_site, root_path, site_prefix,
};
pub use error::{Result, RoutingError};
pub use handler::SitesHandler;
pub use index::SitesIndex;
pub use resolver::{Resolution, Resolver};
pub use router::{RouterOptions, SitesRouter};
