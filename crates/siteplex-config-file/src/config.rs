//! Sites configuration
//!
//! One file describes the listener, the router options and every site.
//! YAML is the default format; a `.toml` extension selects TOML.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, Result};
use crate::expand::Expander;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitesConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Router mount prefix
    #[serde(default)]
    pub prefix: String,

    /// Serve a single site for every request
    #[serde(default)]
    pub alone: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_site: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_domain: Option<String>,

    #[serde(default)]
    pub redirect_site_not_found_to_index: bool,

    /// Do not mount sites under their own name
    #[serde(default)]
    pub not_mount_names: bool,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Merged under every site
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_template: Option<SiteConfig>,

    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_index_title")]
    pub title: String,

    #[serde(default = "default_index_status")]
    pub status: u16,

    /// Site names left out of the listing
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub log_sql_queries: bool,

    #[serde(default = "default_true")]
    pub log_requests: bool,

    /// Emit log lines as JSON objects
    #[serde(default = "default_false")]
    pub json: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub domains: Vec<String>,

    /// Extra path mounts
    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,

    /// Static files served as the site's content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<PathBuf>,

    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Directory of `NNNN_description.sql` files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations: Option<PathBuf>,
}

/// A site ready to be built: template applied, placeholders expanded
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSite {
    pub name: String,
    pub config: SiteConfig,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            prefix: String::new(),
            alone: false,
            default_site: None,
            default_domain: None,
            redirect_site_not_found_to_index: false,
            not_mount_names: false,
            index: IndexConfig::default(),
            logging: LoggingConfig::default(),
            data_dir: default_data_dir(),
            site_template: None,
            sites: BTreeMap::new(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: default_index_title(),
            status: default_index_status(),
            exclude: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_sql_queries: false,
            log_requests: true,
            json: false,
        }
    }
}

impl SitesConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        debug!("Loading sites configuration from {:?}", path);
        parse(path, &contents)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("SITEPLEX_HOST") {
            self.host = val;
        }

        if let Ok(val) = std::env::var("SITEPLEX_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!("Invalid SITEPLEX_PORT '{}', keeping {}", val, self.port),
            }
        }

        if let Ok(val) = std::env::var("SITEPLEX_PREFIX") {
            self.prefix = val;
        }

        if let Ok(val) = std::env::var("SITEPLEX_ALONE") {
            match val.parse::<bool>() {
                Ok(alone) => self.alone = alone,
                Err(_) => warn!("Invalid SITEPLEX_ALONE '{}', keeping {}", val, self.alone),
            }
        }

        if let Ok(val) = std::env::var("SITEPLEX_DEFAULT_SITE") {
            self.default_site = Some(val).filter(|v| !v.is_empty());
        }

        if let Ok(val) = std::env::var("SITEPLEX_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("SITEPLEX_LOG_JSON") {
            if let Ok(json) = val.parse::<bool>() {
                self.logging.json = json;
            }
        }
    }

    /// Check site names and domain bindings
    ///
    /// # Errors
    /// - `ConfigError::Invalid` for blank names, names containing `/`,
    ///   or a domain claimed by two sites
    pub fn validate(&self) -> Result<()> {
        let mut domains: HashMap<String, &str> = HashMap::new();
        for (name, site) in &self.sites {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("site name must not be blank".into()));
            }
            if name.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "site name {name:?} must not contain '/'"
                )));
            }
            if site.disabled {
                continue;
            }
            for domain in &site.domains {
                let key = domain.trim().to_ascii_lowercase();
                if let Some(owner) = domains.insert(key, name) {
                    return Err(ConfigError::Invalid(format!(
                        "domain {domain:?} is bound by both {owner:?} and {name:?}"
                    )));
                }
            }
        }
        if let Some(default) = &self.default_site
            && !self.sites.contains_key(default)
        {
            warn!("Default site {:?} is not configured", default);
        }
        Ok(())
    }

    /// Enabled sites in name order, template applied and placeholders expanded
    pub fn resolved_sites(&self) -> Vec<ResolvedSite> {
        self.sites
            .iter()
            .filter(|(name, site)| {
                if site.disabled {
                    debug!("[{}] disabled, skipped", name);
                }
                !site.disabled
            })
            .map(|(name, site)| {
                let mut config = match &self.site_template {
                    Some(template) => site.merged_over(template),
                    None => site.clone(),
                };
                Expander::new(name, &self.data_dir).expand_site(&mut config);
                ResolvedSite {
                    name: name.clone(),
                    config,
                }
            })
            .collect()
    }
}

impl SiteConfig {
    /// This site with the template filling what it leaves out
    pub fn merged_over(&self, template: &SiteConfig) -> SiteConfig {
        let mut merged = self.clone();
        if merged.title.is_none() {
            merged.title = template.title.clone();
        }
        if merged.domains.is_empty() {
            merged.domains = template.domains.clone();
        }
        if merged.public.is_none() {
            merged.public = template.public.clone();
        }
        for (name, db) in &template.databases {
            merged
                .databases
                .entry(name.clone())
                .or_insert_with(|| db.clone());
        }
        merged
    }
}

pub(crate) fn parse<T: serde::de::DeserializeOwned>(path: &Path, contents: &str) -> Result<T> {
    if path.extension().and_then(|s| s.to_str()) == Some("toml") {
        toml::from_str(contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        // Default to YAML
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_index_title() -> String {
    "Site chooser".to_string()
}

fn default_index_status() -> u16 {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}
