//! Migration errors

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// Failure of one site/database pair, aborting the fan-out
    #[error("site {site:?}, database {database:?}: {source}")]
    Database {
        site: String,
        database: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("site \"{0}\" does not exist")]
    UnknownSite(String),

    #[error("Event handler failed: {0}")]
    Handler(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// A handler asked for a migrator outside the migrate phase
    #[error("Event {0:?} does not carry a migrator")]
    NotMigrating(String),

    #[error("Invalid event pattern {0:?}")]
    InvalidPattern(String),

    #[error("Invalid event name {0:?}")]
    InvalidEventName(String),

    #[error("Invalid migration file {path:?}: {reason}")]
    InvalidMigrationFile { path: PathBuf, reason: String },

    #[error("Invalid migration set: {0}")]
    InvalidMigrations(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Name of the failing database for fan-out errors
    pub fn database(&self) -> Option<&str> {
        match self {
            MigrateError::Database { database, .. } => Some(database),
            _ => None,
        }
    }

    pub fn site(&self) -> Option<&str> {
        match self {
            MigrateError::Database { site, .. } => Some(site),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
