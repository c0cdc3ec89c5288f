//! Site resolution
//!
//! Maps a request host and path onto a [`Resolution`]. Precedence:
//! 1. alone mode serves the single site
//! 2. `/favicon.ico` is never resolved
//! 3. host bindings (`host:port`, `host`, `:port`, then a subdomain of the
//!    default domain used as a site name)
//! 4. paths outside the mount prefix are not found
//! 5. the root path redirects to the default site or shows the index
//! 6. a single segment without trailing slash is redirected (308)
//! 7. the first segment is looked up by mounted path, then by site name
//! 8. anything else goes to the index (when enabled) or not found

use std::sync::Arc;

use http::{StatusCode, Uri};
use siteplex_core::{Site, SiteRegistry};
use tracing::trace;

use crate::router::RouterOptions;

/// Outcome of resolving one request
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Serve `site` with the request path replaced by `path`
    Site {
        site: Arc<Site>,
        /// Stripped prefix when resolved by path
        prefix: Option<String>,
        path: String,
    },
    Redirect {
        status: StatusCode,
        location: String,
    },
    Index,
    NotFound,
    /// Alone mode without a registered site
    NoSite,
}

/// Inputs that do not change between requests
pub struct Resolver<'a> {
    pub registry: &'a SiteRegistry,
    pub options: &'a RouterOptions,
    pub has_index: bool,
    pub alone: bool,
}

impl Resolver<'_> {
    pub fn resolve(&self, host: Option<&str>, uri: &Uri) -> Resolution {
        let path = uri.path();

        if self.alone || self.registry.is_alone() {
            return match alone_site(self.registry, self.options) {
                Some(site) => Resolution::Site {
                    site,
                    prefix: None,
                    path: path.to_string(),
                },
                None => Resolution::NoSite,
            };
        }

        if path == "/favicon.ico" {
            return Resolution::NotFound;
        }

        if let Some(host) = host
            && let Some(site) = self.by_host(host)
        {
            trace!("[{}] resolved by host {}", site.name(), host);
            return Resolution::Site {
                site,
                prefix: None,
                path: path.to_string(),
            };
        }

        let prefix = self.options.mount_prefix();
        let Some(rest) = strip_mount_prefix(path, prefix) else {
            return Resolution::NotFound;
        };

        if rest == "/" {
            if let Some(default) = self.options.default_site.as_deref() {
                return Resolution::Redirect {
                    status: StatusCode::SEE_OTHER,
                    location: format!("{prefix}/{default}/"),
                };
            }
            if self.has_index {
                return Resolution::Index;
            }
            return Resolution::NotFound;
        }

        let trimmed = &rest[1..];
        let (segment, remainder) = match trimmed.split_once('/') {
            Some((segment, remainder)) => (segment, Some(remainder)),
            None => (trimmed, None),
        };

        if remainder.is_none() {
            let location = match uri.query() {
                Some(query) => format!("{prefix}{rest}/?{query}"),
                None => format!("{prefix}{rest}/"),
            };
            return Resolution::Redirect {
                status: StatusCode::PERMANENT_REDIRECT,
                location,
            };
        }

        let site = self
            .registry
            .get_by_path(segment)
            .or_else(|| self.registry.get(segment));

        match site {
            Some(site) => {
                trace!("[{}] resolved by path segment {:?}", site.name(), segment);
                Resolution::Site {
                    site,
                    prefix: Some(format!("{prefix}/{segment}")),
                    path: format!("/{}", remainder.unwrap_or_default()),
                }
            }
            None if self.options.redirect_site_not_found_to_index && self.has_index => {
                Resolution::Index
            }
            None => Resolution::NotFound,
        }
    }

    fn by_host(&self, host: &str) -> Option<Arc<Site>> {
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return None;
        }
        if let Some(site) = self.registry.get_by_host(&host) {
            return Some(site);
        }

        let (name, port) = split_host_port(&host);
        if port.is_some()
            && let Some(site) = self.registry.get_by_host(name)
        {
            return Some(site);
        }
        if let Some(port) = port
            && let Some(site) = self.registry.get_by_host(&format!(":{port}"))
        {
            return Some(site);
        }

        let domain = self.options.default_domain.as_deref()?;
        let label = name.strip_suffix(domain)?.strip_suffix('.')?;
        if label.is_empty() || label.contains('.') {
            return None;
        }
        self.registry.get(label)
    }
}

/// The site served by an alone handler
///
/// An alone registry serves its only site. An indexed registry pinned to
/// alone dispatch serves the default site, or its only site.
pub fn alone_site(registry: &SiteRegistry, options: &RouterOptions) -> Option<Arc<Site>> {
    if registry.is_alone() {
        return registry.site();
    }
    if let Some(default) = options.default_site.as_deref()
        && let Some(site) = registry.get(default)
    {
        return Some(site);
    }
    let mut sites = registry.sites();
    if sites.len() == 1 { sites.pop() } else { None }
}

/// Strip the router mount prefix, returning a path that starts with `/`
fn strip_mount_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(if path.is_empty() { "/" } else { path });
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Split `host:port`, keeping bracketed IPv6 literals intact
pub(crate) fn split_host_port(host: &str) -> (&str, Option<&str>) {
    if host.starts_with('[') {
        return match host.find("]:") {
            Some(end) => (&host[..=end], Some(&host[end + 2..])),
            None => (host, None),
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') => (name, Some(port)),
        _ => (host, None),
    }
}
