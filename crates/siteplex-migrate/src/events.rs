//! Lifecycle events and their dispatcher
//!
//! Event names are `<phase>:<database>` for per-database events and
//! `<base>:<site>` for per-site events. Handlers subscribe with a pattern:
//! `*`, `migrate:*`, `*:main` or an exact name.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use siteplex_core::{Database, Site};
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::strategy::Migrator;

/// Per-site lifecycle event fired by [`FanOut::init_site`](crate::FanOut::init_site)
pub const INIT_SITE: &str = "init.site";

/// Lifecycle phase of a per-database event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Migrate,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Migrate => "migrate",
        }
    }

    /// `<phase>:<database>`
    pub fn event_name(&self, database: &str) -> Result<String> {
        event_name(self.as_str(), database)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join a base name and a suffix, rejecting blank parts
pub fn event_name(base: &str, suffix: &str) -> Result<String> {
    if base.trim().is_empty() || suffix.trim().is_empty() {
        return Err(MigrateError::InvalidEventName(format!("{base}:{suffix}")));
    }
    Ok(format!("{base}:{suffix}"))
}

/// Event delivered to handlers
pub struct Event<'a> {
    name: String,
    site: &'a Arc<Site>,
    database: Option<&'a Arc<Database>>,
    migrator: Option<&'a mut Migrator>,
    commit_disabled: bool,
}

impl<'a> Event<'a> {
    /// Per-site event
    pub fn for_site(name: String, site: &'a Arc<Site>) -> Self {
        Self {
            name,
            site,
            database: None,
            migrator: None,
            commit_disabled: false,
        }
    }

    /// Per-database event, carrying a migrator in the migrate phase
    pub fn for_database(
        name: String,
        site: &'a Arc<Site>,
        database: &'a Arc<Database>,
        migrator: Option<&'a mut Migrator>,
        commit_disabled: bool,
    ) -> Self {
        Self {
            name,
            site,
            database: Some(database),
            migrator,
            commit_disabled,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn site(&self) -> &Arc<Site> {
        self.site
    }

    pub fn database(&self) -> Option<&Arc<Database>> {
        self.database
    }

    pub fn is_commit_disabled(&self) -> bool {
        self.commit_disabled
    }

    /// Migration executor of a migrate event
    ///
    /// # Errors
    /// - `MigrateError::NotMigrating` for events outside the migrate phase
    pub fn migrator(&mut self) -> Result<&mut Migrator> {
        match self.migrator.as_deref_mut() {
            Some(migrator) => Ok(migrator),
            None => Err(MigrateError::NotMigrating(self.name.clone())),
        }
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("site", &self.site.name())
            .field("database", &self.database.map(|db| db.name()))
            .field("commit_disabled", &self.commit_disabled)
            .finish()
    }
}

/// Receives lifecycle events
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &mut Event<'_>) -> Result<()>;
}

/// One side of a `base:suffix` pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePattern {
    Any,
    Exact(String),
}

impl NamePattern {
    fn parse(part: &str, input: &str) -> Result<Self> {
        match part {
            "*" => Ok(NamePattern::Any),
            "" => Err(MigrateError::InvalidPattern(input.to_string())),
            p if p.contains('*') => Err(MigrateError::InvalidPattern(input.to_string())),
            p => Ok(NamePattern::Exact(p.to_string())),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            NamePattern::Any => true,
            NamePattern::Exact(v) => v == value,
        }
    }
}

/// Subscription pattern over event names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPattern {
    All,
    Exact(String),
    Parts {
        base: NamePattern,
        suffix: NamePattern,
    },
}

impl EventPattern {
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        if s == "*" {
            return Ok(EventPattern::All);
        }
        match s.split_once(':') {
            Some((base, suffix)) => Ok(EventPattern::Parts {
                base: NamePattern::parse(base.trim(), input)?,
                suffix: NamePattern::parse(suffix.trim(), input)?,
            }),
            None if s.is_empty() || s.contains('*') => {
                Err(MigrateError::InvalidPattern(input.to_string()))
            }
            None => Ok(EventPattern::Exact(s.to_string())),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            EventPattern::All => true,
            EventPattern::Exact(exact) => exact == name,
            EventPattern::Parts { base, suffix } => match name.split_once(':') {
                Some((b, s)) => base.matches(b) && suffix.matches(s),
                None => false,
            },
        }
    }
}

/// Delivers events to pattern subscribers in registration order
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<(EventPattern, Arc<dyn EventHandler>)>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to events matching `pattern`
    ///
    /// # Errors
    /// - `MigrateError::InvalidPattern` for malformed patterns
    pub fn on(&mut self, pattern: &str, handler: impl EventHandler + 'static) -> Result<&mut Self> {
        self.on_shared(pattern, Arc::new(handler))
    }

    pub fn on_shared(&mut self, pattern: &str, handler: Arc<dyn EventHandler>) -> Result<&mut Self> {
        let pattern = EventPattern::parse(pattern)?;
        self.handlers.push((pattern, handler));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver an event, stopping at the first handler error
    ///
    /// Returns the number of handlers that received the event.
    pub async fn dispatch(&self, event: &mut Event<'_>) -> Result<usize> {
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .iter()
            .filter(|(pattern, _)| pattern.matches(event.name()))
            .map(|(_, handler)| handler.clone())
            .collect();

        debug!("[{}] {} -> {} handler(s)", event.site.name(), event.name, handlers.len());

        for handler in &handlers {
            handler.handle(event).await?;
        }
        Ok(handlers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Phase::Migrate.event_name("main").unwrap(), "migrate:main");
        assert_eq!(Phase::Init.event_name("logs").unwrap(), "init:logs");
        assert!(Phase::Init.event_name(" ").is_err());
        assert_eq!(event_name(INIT_SITE, "shop").unwrap(), "init.site:shop");
    }

    #[test]
    fn test_pattern_matching() {
        let all = EventPattern::parse("*").unwrap();
        assert!(all.matches("migrate:main"));
        assert!(all.matches("anything"));

        let migrate = EventPattern::parse("migrate:*").unwrap();
        assert!(migrate.matches("migrate:main"));
        assert!(!migrate.matches("init:main"));

        let main = EventPattern::parse("*:main").unwrap();
        assert!(main.matches("init:main"));
        assert!(!main.matches("init:logs"));

        let exact = EventPattern::parse("init.site:shop").unwrap();
        assert!(exact.matches("init.site:shop"));
        assert!(!exact.matches("init.site:blog"));

        let bare = EventPattern::parse("ready").unwrap();
        assert!(bare.matches("ready"));
        assert!(!bare.matches("ready:x"));
    }

    #[test]
    fn test_invalid_patterns() {
        for p in ["", "mig*:main", ":main", "migrate:", "re*dy"] {
            assert!(
                matches!(EventPattern::parse(p), Err(MigrateError::InvalidPattern(_))),
                "{p:?} should be rejected"
            );
        }
    }
}
