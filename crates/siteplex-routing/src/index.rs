//! Built-in site chooser page

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use http::{StatusCode, header};
use siteplex_core::{BoxHandler, Site, SiteRegistry, handler_fn};

use crate::context::root_path;

type Renderer = dyn Fn(&[Arc<Site>], &Request) -> Response + Send + Sync;

/// Lists every non-excluded site, then every path mount
#[derive(Clone)]
pub struct SitesIndex {
    registry: Arc<SiteRegistry>,
    title: String,
    status: StatusCode,
    exclude: HashSet<String>,
    renderer: Option<Arc<Renderer>>,
}

impl SitesIndex {
    pub fn new(registry: Arc<SiteRegistry>) -> Self {
        Self {
            registry,
            title: "Site chooser".to_string(),
            status: StatusCode::OK,
            exclude: HashSet::new(),
            renderer: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Replace the HTML page with a custom response
    pub fn with_renderer<F>(mut self, renderer: F) -> Self
    where
        F: Fn(&[Arc<Site>], &Request) -> Response + Send + Sync + 'static,
    {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Sites shown on the page, sorted by name
    pub fn sites(&self) -> Vec<Arc<Site>> {
        self.registry
            .sites()
            .into_iter()
            .filter(|s| !self.exclude.contains(s.name()))
            .collect()
    }

    pub fn render(&self, req: &Request) -> Response {
        let sites = self.sites();
        if let Some(renderer) = &self.renderer {
            return renderer(&sites, req);
        }

        let base = root_path(req).trim_end_matches('/');
        let title = escape_html(&self.title);

        let mut html = format!(
            "<!doctype html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\">\n  \
             <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<ul>\n"
        );
        for site in &sites {
            let name = escape_html(site.name());
            let _ = writeln!(html, "<li><a href=\"{base}/{name}/\">{name}</a></li>");
        }
        // Extra mounts only; name mounts are already listed above
        let mounts = self
            .registry
            .paths()
            .into_iter()
            .filter(|(path, site)| path != site.name() && !self.exclude.contains(site.name()));
        for (path, site) in mounts {
            let _ = writeln!(
                html,
                "<li><a href=\"{base}/{}/\">{}</a></li>",
                escape_html(&path),
                escape_html(site.name())
            );
        }
        html.push_str("</ul>\n</body>\n</html>\n");

        let mut res = Response::new(Body::from(html));
        *res.status_mut() = self.status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            http::HeaderValue::from_static("text/html; charset=utf-8"),
        );
        res
    }

    pub fn into_handler(self) -> BoxHandler {
        let index = Arc::new(self);
        handler_fn(move |req: Request| {
            let index = index.clone();
            async move { index.render(&req) }
        })
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
