//! Sites router
//!
//! Owns the registry-wide middleware stack and fallback handlers, wires
//! the registry notifications (logging, standard site middlewares, name
//! mounts) and builds dispatch handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use axum::body::Body;
use axum::response::Response;
use http::StatusCode;
use siteplex_core::{
    BoxHandler, Duplication, Middleware, MiddlewareStack, SiteRegistry, handler_fn,
};
use tracing::{debug, info, warn};

use crate::error::{Result, RoutingError};
use crate::handler::SitesHandler;
use crate::index::SitesIndex;
use crate::middleware;
use crate::resolver;

/// Router behavior switches
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Mount prefix of the dispatcher, such as `/sites`
    pub prefix: String,
    /// `/` redirects here when set
    pub default_site: Option<String>,
    /// `<site>.<default_domain>` resolves to `<site>`
    pub default_domain: Option<String>,
    pub redirect_site_not_found_to_index: bool,
    /// Do not mount new sites under their own name
    pub not_mount_names: bool,
    /// Install the request-log middleware on new sites
    pub log_requests: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            default_site: None,
            default_domain: None,
            redirect_site_not_found_to_index: false,
            not_mount_names: false,
            log_requests: true,
        }
    }
}

impl RouterOptions {
    /// Prefix with a leading slash and no trailing slash, empty for `/`
    pub fn mount_prefix(&self) -> &str {
        self.prefix.trim_end_matches('/')
    }

    fn normalized(mut self) -> Self {
        let trimmed = self.prefix.trim_matches('/');
        self.prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self.default_domain = self
            .default_domain
            .map(|d| d.trim_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty());
        self.default_site = self.default_site.filter(|s| !s.is_empty());
        self
    }
}

pub(crate) struct RouterInner {
    pub(crate) registry: Arc<SiteRegistry>,
    pub(crate) options: RouterOptions,
    pub(crate) middlewares: MiddlewareStack,
    pub(crate) index: RwLock<Option<BoxHandler>>,
    pub(crate) not_found: RwLock<BoxHandler>,
    initialized: AtomicBool,
}

/// Dispatches requests for every site of a registry
#[derive(Clone)]
pub struct SitesRouter {
    inner: Arc<RouterInner>,
}

impl SitesRouter {
    pub fn new(registry: Arc<SiteRegistry>, options: RouterOptions) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                registry,
                options: options.normalized(),
                middlewares: MiddlewareStack::new("siteplex.sites-router"),
                index: RwLock::new(None),
                not_found: RwLock::new(not_found_handler()),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<SiteRegistry> {
        &self.inner.registry
    }

    pub fn options(&self) -> &RouterOptions {
        &self.inner.options
    }

    /// Register the registry notifications
    ///
    /// Call once before adding sites; later calls do nothing.
    pub fn init(&self) {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        let registry = &self.inner.registry;
        let prefix = self.inner.options.mount_prefix().to_string();

        if !registry.is_alone() {
            let p = prefix.clone();
            registry.on_path_add(move |_, site, path| {
                info!("[{}] path: mounted on {}/{}", site.name(), p, path);
            });
            let p = prefix.clone();
            registry.on_path_remove(move |_, site, path| {
                info!("[{}] path: unmounted from {}/{}", site.name(), p, path);
            });
        }
        registry.on_host_add(|_, site, host| {
            info!("[{}] host: mounted on {}", site.name(), host);
        });
        registry.on_host_remove(|_, site, host| {
            info!("[{}] host: unmounted from {}", site.name(), host);
        });

        let log_requests = self.inner.options.log_requests;
        registry.on_add(move |_, site| {
            info!("[{}] added", site.name());

            let mut standard = Vec::with_capacity(2);
            if log_requests {
                standard.push(middleware::request_log(site));
            }
            standard.push(middleware::recover(site));
            if let Err(e) = site.middlewares().add(standard, Duplication::Skip) {
                warn!("[{}] standard middlewares not installed: {}", site.name(), e);
            }
        });

        registry.on_destroy(|_, site| {
            info!("[{}] deleted", site.name());
        });

        if !self.inner.options.not_mount_names {
            registry.on_post_add(|registry, site| {
                if registry.is_alone() {
                    return;
                }
                if let Err(e) = registry.add_path(site.name(), site.name()) {
                    warn!("[{}] not mounted under its name: {}", site.name(), e);
                }
            });
        }

        debug!("Sites router initialized (prefix {:?})", prefix);
    }

    /// Add router-wide middlewares, rejecting duplicate names
    pub fn use_middleware(&self, middlewares: impl IntoIterator<Item = Middleware>) -> Result<()> {
        self.inner
            .middlewares
            .add(middlewares, Duplication::Abort)?;
        Ok(())
    }

    pub fn middleware(&self, name: &str) -> Option<Middleware> {
        self.inner.middlewares.get(name)
    }

    pub fn middlewares(&self) -> &MiddlewareStack {
        &self.inner.middlewares
    }

    /// Handler for `/` without default site and for unmatched sites
    pub fn set_index_handler(&self, handler: BoxHandler) {
        *self
            .inner
            .index
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handler);
    }

    pub fn set_not_found_handler(&self, handler: BoxHandler) {
        *self
            .inner
            .not_found
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = handler;
    }

    /// The built-in chooser page over this router's registry
    pub fn create_sites_index(&self) -> SitesIndex {
        SitesIndex::new(self.inner.registry.clone())
    }

    /// Dispatch handler using the middlewares registered so far
    pub fn create_handler(&self) -> SitesHandler {
        SitesHandler::new(self.inner.clone(), self.inner.middlewares.build(), false)
    }

    /// Dispatch handler that serves one site for every request
    ///
    /// # Errors
    /// - `RoutingError::NoSiteRegistered` when there is no site to serve
    pub fn create_alone_handler(&self) -> Result<SitesHandler> {
        if resolver::alone_site(&self.inner.registry, &self.inner.options).is_none() {
            return Err(RoutingError::NoSiteRegistered);
        }
        Ok(SitesHandler::new(
            self.inner.clone(),
            self.inner.middlewares.build(),
            true,
        ))
    }

    /// Catch-all axum router around a dispatch handler
    pub fn into_axum_router(&self) -> Result<axum::Router> {
        let handler = if self.inner.registry.is_alone() {
            self.create_alone_handler()?
        } else {
            self.create_handler()
        };
        Ok(axum::Router::new().fallback_service(handler))
    }
}

fn not_found_handler() -> BoxHandler {
    handler_fn(|_req| async {
        let mut res = Response::new(Body::from("404 page not found"));
        *res.status_mut() = StatusCode::NOT_FOUND;
        res
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteplex_core::Site;

    fn site(name: &str) -> Arc<Site> {
        Arc::new(Site::builder(name).build().unwrap())
    }

    #[test]
    fn test_options_normalized() {
        let router = SitesRouter::new(
            Arc::new(SiteRegistry::indexed()),
            RouterOptions {
                prefix: "sites/".into(),
                default_domain: Some(".Example.com".into()),
                default_site: Some(String::new()),
                ..Default::default()
            },
        );
        assert_eq!(router.options().prefix, "/sites");
        assert_eq!(router.options().default_domain.as_deref(), Some("example.com"));
        assert!(router.options().default_site.is_none());
    }

    #[test]
    fn test_init_mounts_names_and_installs_standard_middlewares() {
        let registry = Arc::new(SiteRegistry::indexed());
        let router = SitesRouter::new(registry.clone(), RouterOptions::default());
        router.init();
        router.init();

        registry.add(site("shop")).unwrap();

        assert_eq!(registry.get_by_path("shop").unwrap().name(), "shop");
        assert_eq!(
            registry.get("shop").unwrap().middlewares().names(),
            vec![middleware::REQUEST_LOG, middleware::RECOVER]
        );
    }

    #[test]
    fn test_not_mount_names() {
        let registry = Arc::new(SiteRegistry::indexed());
        let router = SitesRouter::new(
            registry.clone(),
            RouterOptions {
                not_mount_names: true,
                log_requests: false,
                ..Default::default()
            },
        );
        router.init();
        registry.add(site("shop")).unwrap();

        assert!(registry.get_by_path("shop").is_none());
        assert_eq!(
            registry.get("shop").unwrap().middlewares().names(),
            vec![middleware::RECOVER]
        );
    }

    #[test]
    fn test_use_middleware_rejects_duplicates() {
        let router = SitesRouter::new(Arc::new(SiteRegistry::indexed()), RouterOptions::default());
        router
            .use_middleware([Middleware::new("auth", |next| next)])
            .unwrap();

        let err = router
            .use_middleware([
                Middleware::new("cors", |next| next),
                Middleware::new("auth", |next| next),
            ])
            .unwrap_err();
        assert!(matches!(err, RoutingError::Core(_)));
        assert_eq!(router.middlewares().names(), vec!["auth"]);
        assert!(router.middleware("auth").is_some());
    }

    #[test]
    fn test_alone_handler_requires_a_site() {
        let registry = Arc::new(SiteRegistry::alone());
        let router = SitesRouter::new(registry.clone(), RouterOptions::default());
        router.init();

        assert!(matches!(
            router.create_alone_handler(),
            Err(RoutingError::NoSiteRegistered)
        ));
        assert!(router.into_axum_router().is_err());

        registry.add(site("only")).unwrap();
        assert!(router.create_alone_handler().is_ok());
        assert!(registry.get_by_path("only").is_none());
    }
}
