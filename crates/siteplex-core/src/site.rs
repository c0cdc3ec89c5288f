//! Sites (tenants) served from a single listener
//!
//! A [`Site`] is built by the bootstrap code before it is added to a
//! [`SiteRegistry`](crate::registry::SiteRegistry). It owns its databases,
//! its request handler and a site-local middleware stack; the registry only
//! indexes shared references to it.

use std::fmt;
use std::sync::{Arc, RwLock};

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use http::StatusCode;
use tracing::debug;

use crate::database::Database;
use crate::middleware::{BoxHandler, MiddlewareStack, call_handler};
use crate::request_log::RequestLogFormatter;
use crate::{Error, Result};

/// An independently configured application instance
pub struct Site {
    name: String,
    title: String,
    domains: Vec<String>,
    databases: Vec<Arc<Database>>,
    handler: RwLock<HandlerSlot>,
    middlewares: MiddlewareStack,
    log_formatter: Option<Arc<dyn RequestLogFormatter>>,
}

/// The handler plus its middleware chain as of a stack generation
#[derive(Default)]
struct HandlerSlot {
    handler: Option<BoxHandler>,
    chain: Option<(u64, BoxHandler)>,
}

impl Site {
    pub fn builder(name: impl Into<String>) -> SiteBuilder {
        SiteBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable title, defaults to the name
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Domains declared by the site configuration
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Databases in their natural (declaration) order
    pub fn databases(&self) -> &[Arc<Database>] {
        &self.databases
    }

    pub fn db(&self, name: &str) -> Option<&Arc<Database>> {
        self.databases.iter().find(|db| db.name() == name)
    }

    /// Visit every database in natural order, stopping at the first error
    pub fn each_db<E>(
        &self,
        mut f: impl FnMut(&Arc<Database>) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        for db in &self.databases {
            f(db)?;
        }
        Ok(())
    }

    /// Replace the request handler
    pub fn set_handler(&self, handler: BoxHandler) {
        *self
            .handler
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = HandlerSlot {
            handler: Some(handler),
            chain: None,
        };
    }

    pub fn has_handler(&self) -> bool {
        self.handler
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .handler
            .is_some()
    }

    /// Site-local middlewares wrapped around the handler on every request
    pub fn middlewares(&self) -> &MiddlewareStack {
        &self.middlewares
    }

    pub fn request_log_formatter(&self) -> Option<Arc<dyn RequestLogFormatter>> {
        self.log_formatter.clone()
    }

    /// Serve a request through the site middlewares and handler
    ///
    /// A site without a handler answers `404 Not Found`.
    pub async fn serve(&self, req: Request) -> Response {
        let Some(chain) = self.chain() else {
            debug!("[{}] no handler installed", self.name);
            let mut res = Response::new(Body::empty());
            *res.status_mut() = StatusCode::NOT_FOUND;
            return res;
        };
        call_handler(chain, req).await
    }

    /// The handler wrapped in the current middlewares
    ///
    /// The wrapped chain is reused until the handler is replaced or a
    /// middleware is added.
    fn chain(&self) -> Option<BoxHandler> {
        let generation = self.middlewares.generation();
        {
            let slot = self
                .handler
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match &slot.chain {
                Some((built, chain)) if *built == generation => return Some(chain.clone()),
                _ if slot.handler.is_none() => return None,
                _ => {}
            }
        }

        let mut slot = self
            .handler
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let handler = slot.handler.clone()?;
        let chain = self.middlewares.build().handler(handler);
        slot.chain = Some((generation, chain.clone()));
        debug!("[{}] middleware chain rebuilt", self.name);
        Some(chain)
    }

    /// Close every database pool
    ///
    /// Closing never fails the caller; teardown always visits all pools.
    pub async fn close_databases(&self) {
        for db in &self.databases {
            db.close().await;
            debug!("[{}] database {:?} closed", self.name, db.name());
        }
    }
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("name", &self.name)
            .field("domains", &self.domains)
            .field("databases", &self.databases)
            .finish()
    }
}

/// Builder for [`Site`]
pub struct SiteBuilder {
    name: String,
    title: Option<String>,
    domains: Vec<String>,
    databases: Vec<Arc<Database>>,
    handler: Option<BoxHandler>,
    log_formatter: Option<Arc<dyn RequestLogFormatter>>,
}

impl SiteBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            domains: Vec::new(),
            databases: Vec::new(),
            handler: None,
            log_formatter: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.push(domain.into());
        self
    }

    pub fn domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains.extend(domains.into_iter().map(Into::into));
        self
    }

    pub fn database(mut self, db: Database) -> Self {
        self.databases.push(Arc::new(db));
        self
    }

    pub fn handler(mut self, handler: BoxHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn request_log_formatter(mut self, formatter: impl RequestLogFormatter + 'static) -> Self {
        self.log_formatter = Some(Arc::new(formatter));
        self
    }

    /// Validate and build the site
    ///
    /// # Errors
    /// - `Error::InvalidSite` for a blank name, a name containing `/`, or two
    ///   databases sharing a name
    pub fn build(self) -> Result<Site> {
        validate_site_name(&self.name)?;

        for (i, db) in self.databases.iter().enumerate() {
            if self.databases[..i].iter().any(|d| d.name() == db.name()) {
                return Err(Error::InvalidSite(format!(
                    "site {:?} declares database {:?} twice",
                    self.name,
                    db.name()
                )));
            }
        }

        let title = self.title.unwrap_or_else(|| self.name.clone());
        let middlewares = MiddlewareStack::new(format!("site:{}", self.name));

        Ok(Site {
            name: self.name,
            title,
            domains: self.domains,
            databases: self.databases,
            handler: RwLock::new(HandlerSlot {
                handler: self.handler,
                chain: None,
            }),
            middlewares,
            log_formatter: self.log_formatter,
        })
    }
}

/// Site names double as path segments and event name suffixes
pub fn validate_site_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidSite("site name is blank".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidSite(format!(
            "site name {name:?} must not contain '/'"
        )));
    }
    Ok(())
}
