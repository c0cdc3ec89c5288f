//! Cross-site event fan-out
//!
//! Fires one event per site/database pair. Sites are visited in name
//! order; databases in the order of the allow-list when one is given,
//! otherwise in the site's declaration order. The first failure stops the
//! whole fan-out and is returned with the site and database attached.

use std::sync::Arc;

use siteplex_core::{Database, Site, SiteRegistry};
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::events::{Event, EventDispatcher, INIT_SITE, Phase, event_name};
use crate::strategy::strategy_for;

/// Selection and behavior of one fan-out run
#[derive(Debug, Clone, Default)]
pub struct FanOutOptions {
    /// Only these databases, in this order (all when empty)
    pub databases: Vec<String>,
    /// Only these sites (all when empty)
    pub sites: Vec<String>,
    /// Roll back every migration transaction
    pub commit_disabled: bool,
}

impl FanOutOptions {
    pub fn dry_run(mut self, commit_disabled: bool) -> Self {
        self.commit_disabled = commit_disabled;
        self
    }

    pub fn databases<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.databases = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn sites<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sites = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Site/database pairs that received an event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub processed: Vec<(String, String)>,
}

impl FanOutReport {
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}

/// Broadcasts lifecycle events across the sites of a registry
pub struct FanOut<'a> {
    registry: &'a SiteRegistry,
    dispatcher: &'a EventDispatcher,
}

impl<'a> FanOut<'a> {
    pub fn new(registry: &'a SiteRegistry, dispatcher: &'a EventDispatcher) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    pub async fn init(&self, options: &FanOutOptions) -> Result<FanOutReport> {
        self.run(Phase::Init, options).await
    }

    pub async fn migrate(&self, options: &FanOutOptions) -> Result<FanOutReport> {
        self.run(Phase::Migrate, options).await
    }

    /// Fire `init.site:<site>` for one site
    pub async fn init_site(&self, site: &Arc<Site>) -> Result<()> {
        let name = event_name(INIT_SITE, site.name())?;
        let mut event = Event::for_site(name, site);
        self.dispatcher.dispatch(&mut event).await?;
        Ok(())
    }

    /// Fire `<phase>:<database>` for every selected site/database pair
    ///
    /// # Errors
    /// - `MigrateError::UnknownSite` for a site filter naming a missing site
    /// - `MigrateError::Database` wrapping the first failure
    pub async fn run(&self, phase: Phase, options: &FanOutOptions) -> Result<FanOutReport> {
        let sites = self.select_sites(&options.sites)?;
        let mut report = FanOutReport::default();

        if phase == Phase::Migrate && options.commit_disabled {
            info!("Dry run: migrations are rolled back");
        }

        for site in &sites {
            for db in select_databases(site, &options.databases) {
                self.fire(phase, site, db, options.commit_disabled)
                    .await
                    .map_err(|source| MigrateError::Database {
                        site: site.name().to_string(),
                        database: db.name().to_string(),
                        source: Box::new(source),
                    })?;
                report
                    .processed
                    .push((site.name().to_string(), db.name().to_string()));
            }
        }

        debug!("{} fan-out reached {} database(s)", phase, report.len());
        Ok(report)
    }

    async fn fire(
        &self,
        phase: Phase,
        site: &Arc<Site>,
        db: &Arc<Database>,
        commit_disabled: bool,
    ) -> Result<()> {
        let name = phase.event_name(db.name())?;
        info!("[{}] {}", site.name(), name);

        if phase != Phase::Migrate {
            let mut event = Event::for_database(name, site, db, None, false);
            self.dispatcher.dispatch(&mut event).await?;
            return Ok(());
        }

        let strategy = strategy_for(commit_disabled);
        let mut migrator = strategy.begin(db).await?;
        let outcome = {
            let mut event =
                Event::for_database(name, site, db, Some(&mut migrator), commit_disabled);
            self.dispatcher.dispatch(&mut event).await.map(|_| ())
        };

        let finished = strategy.finish(migrator, outcome.is_ok()).await;
        match outcome {
            Ok(()) => finished,
            Err(e) => {
                if let Err(close) = finished {
                    warn!("[{}] rollback failed on {:?}: {}", site.name(), db.name(), close);
                }
                Err(e)
            }
        }
    }

    fn select_sites(&self, names: &[String]) -> Result<Vec<Arc<Site>>> {
        if names.is_empty() {
            return Ok(self.registry.sites());
        }
        let mut sites = Vec::with_capacity(names.len());
        for name in names {
            let site = self
                .registry
                .get(name)
                .ok_or_else(|| MigrateError::UnknownSite(name.clone()))?;
            sites.push(site);
        }
        sites.sort_by(|a, b| a.name().cmp(b.name()));
        sites.dedup_by(|a, b| a.name() == b.name());
        Ok(sites)
    }
}

fn select_databases<'s>(site: &'s Site, names: &[String]) -> Vec<&'s Arc<Database>> {
    if names.is_empty() {
        return site.databases().iter().collect();
    }
    names
        .iter()
        .filter_map(|name| {
            let db = site.db(name);
            if db.is_none() {
                debug!("[{}] has no database {:?}, skipped", site.name(), name);
            }
            db
        })
        .collect()
}
