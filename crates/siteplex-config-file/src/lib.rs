//! Siteplex sites configuration
//!
//! Loads the listener settings, router options and site definitions from a
//! single YAML/TOML file or from a configuration directory, then applies
//! environment overrides and the site template.

pub mod config;
pub mod dir_loader;
pub mod error;
pub mod expand;

pub use config::{
    DatabaseConfig, IndexConfig, LoggingConfig, ResolvedSite, SiteConfig, SitesConfig,
};
pub use error::{ConfigError, Result};
pub use expand::Expander;
