//! Error types for Siteplex Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Registry errors
    #[error("Site {0:?} already registered")]
    DuplicateSite(String),

    #[error("Path {path:?} already mounted by site {site:?}")]
    DuplicatePath { path: String, site: String },

    #[error("Host {host:?} already bound to site {site:?}")]
    DuplicateHost { host: String, site: String },

    #[error("Unknown site: {0:?}")]
    UnknownSite(String),

    #[error("Registry is in alone mode: {0}")]
    AloneMode(String),

    #[error("Alone registry already serves site {0:?}")]
    AloneSiteOccupied(String),

    #[error("Invalid site: {0}")]
    InvalidSite(String),

    #[error("Invalid mount key: {0}")]
    InvalidMount(String),

    // Middleware errors
    #[error("Middleware {name:?} already registered in stack {stack:?}")]
    DuplicateMiddleware { name: String, stack: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
