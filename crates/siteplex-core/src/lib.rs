//! Siteplex Core
//!
//! Sites, their databases, named middleware stacks and the multi-index
//! site registry shared by the routing and migration crates.

pub mod database;
pub mod error;
pub mod middleware;
pub mod registry;
pub mod request_log;
pub mod site;

pub use database::Database;
pub use error::{Error, Result};
pub use middleware::{
    BoxHandler, Duplication, Middleware, MiddlewareChain, MiddlewareStack, boxed, call_handler,
    handler_fn,
};
pub use registry::{MountHook, RegistryMode, SiteHook, SiteRegistry};
pub use request_log::{RequestLogEntry, RequestLogFormatter};
pub use site::{Site, SiteBuilder, validate_site_name};
