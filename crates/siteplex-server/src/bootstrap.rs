//! Registry and router assembly from the sites configuration
//!
//! The router is initialized before any site is added so its registry
//! hooks install the standard middlewares and the name mounts. Extra path
//! and domain bindings from the configuration follow each registration,
//! then `init.site:<site>` is fired through the lifecycle dispatcher.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use siteplex_config_file::{ResolvedSite, SitesConfig};
use siteplex_core::{Database, Site, SiteRegistry, boxed};
use siteplex_migrate::{EventDispatcher, FanOut};
use siteplex_routing::{RouterOptions, SitesRouter};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

pub struct Bootstrap {
    pub registry: Arc<SiteRegistry>,
    pub router: SitesRouter,
}

pub fn router_options(config: &SitesConfig) -> RouterOptions {
    RouterOptions {
        prefix: config.prefix.clone(),
        default_site: config.default_site.clone(),
        default_domain: config.default_domain.clone(),
        redirect_site_not_found_to_index: config.redirect_site_not_found_to_index,
        not_mount_names: config.not_mount_names,
        log_requests: config.logging.log_requests,
    }
}

/// Open every enabled site and register it
///
/// A failing `init.site` handler is logged and does not undo the
/// registration.
pub async fn build(config: &SitesConfig, lifecycle: &EventDispatcher) -> Result<Bootstrap> {
    config.validate().context("Invalid sites configuration")?;

    let registry = Arc::new(if config.alone {
        SiteRegistry::alone()
    } else {
        SiteRegistry::indexed()
    });
    let router = SitesRouter::new(registry.clone(), router_options(config));
    router.init();

    if config.index.enabled && !config.alone {
        let status = StatusCode::from_u16(config.index.status).unwrap_or_else(|_| {
            warn!("Invalid index status {}, using 200", config.index.status);
            StatusCode::OK
        });
        let index = router
            .create_sites_index()
            .with_title(config.index.title.clone())
            .with_status(status)
            .exclude(config.index.exclude.iter().cloned());
        router.set_index_handler(index.into_handler());
    }

    if config.sites.values().any(|s| !s.databases.is_empty()) {
        let data_dir = expanded_data_dir(&config.data_dir);
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {data_dir:?}"))?;
    }

    let fan_out = FanOut::new(&registry, lifecycle);
    for resolved in config.resolved_sites() {
        let site = Arc::new(
            open_site(&resolved)
                .await
                .with_context(|| format!("Failed to open site {:?}", resolved.name))?,
        );
        registry
            .add(site.clone())
            .with_context(|| format!("Failed to register site {:?}", resolved.name))?;

        if !registry.is_alone() {
            bind_site(&registry, &resolved)?;
        }

        if let Err(e) = fan_out.init_site(&site).await {
            warn!("[{}] init.site failed: {}", resolved.name, e);
        }
    }

    info!("{} site(s) registered", registry.len());
    Ok(Bootstrap { registry, router })
}

fn bind_site(registry: &SiteRegistry, resolved: &ResolvedSite) -> Result<()> {
    for path in &resolved.config.paths {
        registry
            .add_path(&resolved.name, path)
            .with_context(|| format!("Failed to mount site {:?} on {path:?}", resolved.name))?;
    }
    for domain in &resolved.config.domains {
        registry
            .add_host(&resolved.name, domain)
            .with_context(|| format!("Failed to bind site {:?} to {domain:?}", resolved.name))?;
    }
    Ok(())
}

/// Close the database pools of every registered site
pub async fn close(registry: &SiteRegistry) {
    for site in registry.sites() {
        site.close_databases().await;
    }
    debug!("Database pools closed");
}

async fn open_site(resolved: &ResolvedSite) -> Result<Site> {
    let config = &resolved.config;
    let mut builder = Site::builder(&resolved.name).domains(config.domains.iter().cloned());
    if let Some(title) = &config.title {
        builder = builder.title(title);
    }

    for (name, db) in &config.databases {
        let mut database = Database::connect(name, &db.url, db.max_connections)
            .await
            .with_context(|| format!("Failed to connect database {name:?}"))?;
        if let Some(dir) = &db.migrations {
            database = database.with_migrations_dir(dir);
        }
        builder = builder.database(database);
    }

    if let Some(public) = &config.public {
        builder = builder.handler(static_files(public));
    }

    Ok(builder.build()?)
}

fn static_files(dir: &Path) -> siteplex_core::BoxHandler {
    debug!("Serving static files from {:?}", dir);
    boxed(axum::Router::new().fallback_service(ServeDir::new(dir)))
}

fn expanded_data_dir(data_dir: &str) -> String {
    siteplex_config_file::Expander::new("", data_dir).expand("${DATA_DIR}")
}
