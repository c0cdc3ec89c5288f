//! Routing errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    /// Alone mode was requested but the registry holds no site
    #[error("no site registered")]
    NoSiteRegistered,

    #[error(transparent)]
    Core(#[from] siteplex_core::Error),
}

pub type Result<T> = std::result::Result<T, RoutingError>;
