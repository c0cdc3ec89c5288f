//! Maintenance subcommands

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use siteplex_core::{Site, SiteRegistry};
use siteplex_migrate::{
    Event, EventDispatcher, EventHandler, FanOut, FanOutOptions, INIT_SITE, MigrateError, Phase,
    SchemaMigrations,
};
use tracing::{debug, info};

/// `[SITE|*]` argument as a fan-out site filter
///
/// Without a site, or with `*`, every registered site is selected. A
/// single registered site is therefore picked implicitly.
pub fn site_filter(site: Option<&str>) -> Vec<String> {
    match site {
        None | Some("*") => Vec::new(),
        Some(name) => vec![name.to_string()],
    }
}

/// Checks that databases answer before init handlers rely on them
///
/// A per-database event checks its database; a per-site event checks
/// every database of the site.
struct ConnectionCheck;

#[async_trait]
impl EventHandler for ConnectionCheck {
    async fn handle(&self, event: &mut Event<'_>) -> siteplex_migrate::Result<()> {
        let site = event.site().clone();
        let databases = match event.database() {
            Some(db) => vec![db.clone()],
            None => site.databases().to_vec(),
        };
        for db in databases {
            sqlx::query("SELECT 1").execute(db.pool()).await?;
            debug!("[{}] {:?} is reachable", site.name(), db.name());
        }
        Ok(())
    }
}

/// Handlers for the `init.site:<site>` event fired as each site registers
pub fn lifecycle_dispatcher() -> Result<EventDispatcher> {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.on(&format!("{INIT_SITE}:*"), ConnectionCheck)?;
    Ok(dispatcher)
}

/// Apply pending schema migrations, rolled back under `--check`
pub async fn migrate(
    registry: &SiteRegistry,
    site: Option<&str>,
    databases: Vec<String>,
    check: bool,
) -> Result<()> {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.on("migrate:*", SchemaMigrations::from_database_dirs())?;

    let options = FanOutOptions::default()
        .sites(site_filter(site))
        .databases(databases)
        .dry_run(check);
    let report = run(registry, &dispatcher, Phase::Migrate, &options).await?;

    if check {
        info!("Migration check passed on {} database(s)", report);
    } else {
        info!("Migrated {} database(s)", report);
    }
    Ok(())
}

/// Fire `init:<db>` for each selected site/database pair
///
/// `init.site` already fired when the sites were registered.
pub async fn init_db(
    registry: &SiteRegistry,
    site: Option<&str>,
    databases: Vec<String>,
) -> Result<()> {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.on("init:*", ConnectionCheck)?;

    let options = FanOutOptions::default()
        .sites(site_filter(site))
        .databases(databases);
    let report = run(registry, &dispatcher, Phase::Init, &options).await?;
    info!("Initialized {} database(s)", report);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SiteSummary {
    pub name: String,
    pub title: String,
    pub paths: Vec<String>,
    pub hosts: Vec<String>,
    pub databases: Vec<String>,
}

/// Registered sites with their bindings, in name order
pub fn site_summaries(registry: &SiteRegistry) -> Vec<SiteSummary> {
    let paths = registry.paths();
    let hosts = registry.hosts();

    registry
        .sites()
        .into_iter()
        .map(|site| {
            let bound = |bindings: &[(String, Arc<Site>)]| -> Vec<String> {
                bindings
                    .iter()
                    .filter(|(_, s)| s.name() == site.name())
                    .map(|(key, _)| key.clone())
                    .collect()
            };
            SiteSummary {
                name: site.name().to_string(),
                title: site.title().to_string(),
                paths: bound(&paths),
                hosts: bound(&hosts),
                databases: site.databases().iter().map(|db| db.name().to_string()).collect(),
            }
        })
        .collect()
}

/// Print each site with its bindings
pub fn list_sites(registry: &SiteRegistry, json: bool) -> Result<()> {
    let summaries = site_summaries(registry);
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    for site in &summaries {
        println!("{}", site.name);
        if site.title != site.name {
            println!("  title:     {}", site.title);
        }
        for path in &site.paths {
            println!("  path:      /{}", path);
        }
        for host in &site.hosts {
            println!("  host:      {}", host);
        }
        for db in &site.databases {
            println!("  database:  {}", db);
        }
    }
    Ok(())
}

async fn run(
    registry: &SiteRegistry,
    dispatcher: &EventDispatcher,
    phase: Phase,
    options: &FanOutOptions,
) -> Result<usize> {
    match FanOut::new(registry, dispatcher).run(phase, options).await {
        Ok(report) => Ok(report.len()),
        Err(e @ MigrateError::UnknownSite(_)) => Err(e.into()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("{phase} failed"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{self, Bootstrap};
    use siteplex_config_file::{DatabaseConfig, SiteConfig, SitesConfig};
    use tempfile::TempDir;

    async fn registry_with_migrations(dir: &TempDir) -> std::sync::Arc<SiteRegistry> {
        let migrations = dir.path().join("migrations");
        std::fs::create_dir(&migrations).unwrap();
        std::fs::write(
            migrations.join("0001_create_pages.sql"),
            "CREATE TABLE pages (id INTEGER PRIMARY KEY);",
        )
        .unwrap();

        let mut config = SitesConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        let mut site = SiteConfig::default();
        site.databases.insert(
            "main".into(),
            DatabaseConfig {
                url: "sqlite://${DATA_DIR}/${SITE_NAME}.db?mode=rwc".into(),
                max_connections: 1,
                migrations: Some(migrations),
            },
        );
        config.sites.insert("shop".into(), site);

        let lifecycle = lifecycle_dispatcher().unwrap();
        let Bootstrap { registry, .. } = bootstrap::build(&config, &lifecycle).await.unwrap();
        registry
    }

    async fn version(registry: &SiteRegistry) -> Option<i64> {
        let site = registry.get("shop").unwrap();
        let pool = site.db("main").unwrap().pool();
        SchemaMigrations::current_version(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_migrate_check_then_apply() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with_migrations(&dir).await;

        migrate(&registry, None, Vec::new(), true).await.unwrap();
        assert_eq!(version(&registry).await, None);

        migrate(&registry, Some("shop"), vec!["main".into()], false)
            .await
            .unwrap();
        assert_eq!(version(&registry).await, Some(1));
    }

    #[tokio::test]
    async fn test_unknown_site() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with_migrations(&dir).await;

        let err = migrate(&registry, Some("blog"), Vec::new(), false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "site \"blog\" does not exist");

        init_db(&registry, None, Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_site_summaries() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with_migrations(&dir).await;
        registry.add_host("shop", "shop.test").unwrap();

        let summaries = site_summaries(&registry);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "shop");
        assert_eq!(summaries[0].paths, vec!["shop"]);
        assert_eq!(summaries[0].hosts, vec!["shop.test"]);
        assert_eq!(summaries[0].databases, vec!["main"]);

        let json = serde_json::to_value(&summaries).unwrap();
        assert_eq!(json[0]["hosts"][0], "shop.test");
    }

    #[tokio::test]
    async fn test_lifecycle_checks_every_site_database() {
        let dir = TempDir::new().unwrap();
        let registry = registry_with_migrations(&dir).await;
        let lifecycle = lifecycle_dispatcher().unwrap();
        let site = registry.get("shop").unwrap();

        FanOut::new(&registry, &lifecycle).init_site(&site).await.unwrap();

        site.close_databases().await;
        let err = FanOut::new(&registry, &lifecycle)
            .init_site(&site)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Sql(sqlx::Error::PoolClosed)));
    }

    #[test]
    fn test_site_filter() {
        assert!(site_filter(None).is_empty());
        assert!(site_filter(Some("*")).is_empty());
        assert_eq!(site_filter(Some("shop")), vec!["shop"]);
    }
}
