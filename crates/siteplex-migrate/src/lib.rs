//! Siteplex Migrate
//!
//! Cross-site lifecycle event fan-out and transactional schema migrations.
//!
//! ```no_run
//! # async fn run(registry: &siteplex_core::SiteRegistry) -> siteplex_migrate::Result<()> {
//! use siteplex_migrate::{EventDispatcher, FanOut, FanOutOptions, SchemaMigrations};
//!
//! let mut dispatcher = EventDispatcher::new();
//! dispatcher.on("migrate:*", SchemaMigrations::from_database_dirs())?;
//!
//! let options = FanOutOptions::default().dry_run(true);
//! FanOut::new(registry, &dispatcher).migrate(&options).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod fanout;
pub mod schema;
pub mod strategy;

pub use error::{MigrateError, Result};
pub use events::{
    Event, EventDispatcher, EventHandler, EventPattern, INIT_SITE, NamePattern, Phase, event_name,
};
pub use fanout::{FanOut, FanOutOptions, FanOutReport};
pub use schema::{Migration, SchemaMigrations};
pub use strategy::{Direct, DryRun, MigrationStrategy, Migrator, strategy_for};
