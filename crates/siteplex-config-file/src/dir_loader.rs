//! Directory-based configuration
//!
//! ```text
//! <dir>/config.yaml        main file (config.yml or config.toml also work)
//! <dir>/sites/shop.yaml    one site, keyed "shop"
//! <dir>/sites/_blog.yml    one site, keyed "blog"
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{SiteConfig, SitesConfig, parse};
use crate::error::{ConfigError, Result};

const MAIN_FILES: [&str; 3] = ["config.yaml", "config.yml", "config.toml"];

impl SitesConfig {
    /// Load the main file and every site file of a configuration directory
    ///
    /// # Errors
    /// - `ConfigError::NotFound` when `dir` is not a directory
    /// - `ConfigError::Invalid` when a site file repeats a site of the main file
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ConfigError::NotFound(dir.to_path_buf()));
        }

        let mut config = match MAIN_FILES.iter().map(|f| dir.join(f)).find(|p| p.is_file()) {
            Some(main) => SitesConfig::from_file(main)?,
            None => {
                debug!("No main configuration file in {:?}, using defaults", dir);
                SitesConfig::default()
            }
        };

        let sites_dir = dir.join("sites");
        if !sites_dir.is_dir() {
            return Ok(config);
        }

        for path in site_files(&sites_dir)? {
            let Some(name) = key_name(&path) else {
                continue;
            };
            let contents = std::fs::read_to_string(&path)?;
            let site: SiteConfig = parse(&path, &contents)?;
            if site.disabled {
                debug!("[{}] disabled in {:?}, skipped", name, path);
                continue;
            }
            if config.sites.contains_key(&name) {
                return Err(ConfigError::Invalid(format!(
                    "site {name:?} from {path:?} is already configured"
                )));
            }
            debug!("[{}] loaded from {:?}", name, path);
            config.sites.insert(name, site);
        }
        Ok(config)
    }
}

/// Visible `*.yaml` / `*.yml` files, sorted
fn site_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') || !path.is_file() {
            continue;
        }
        if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        ) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File stem without a leading `_`
fn key_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let key = stem.trim_start_matches('_');
    (!key.is_empty()).then(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_key_name() {
        assert_eq!(key_name(Path::new("sites/shop.yaml")).as_deref(), Some("shop"));
        assert_eq!(key_name(Path::new("sites/_blog.yml")).as_deref(), Some("blog"));
        assert_eq!(key_name(Path::new("sites/_.yml")), None);
    }

    #[test]
    fn test_from_dir() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "config.yaml", "port: 7100\nsites:\n  main: {}\n");
        write(dir.path(), "sites/shop.yaml", "domains: [shop.test]\n");
        write(dir.path(), "sites/_blog.yml", "title: Blog\n");
        write(dir.path(), "sites/.hidden.yaml", "title: Hidden\n");
        write(dir.path(), "sites/old.yaml", "disabled: true\n");
        write(dir.path(), "sites/notes.txt", "ignored");

        let config = SitesConfig::from_dir(dir.path()).unwrap();
        assert_eq!(config.port, 7100);
        let names: Vec<&str> = config.sites.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["blog", "main", "shop"]);
        assert_eq!(config.sites["blog"].title.as_deref(), Some("Blog"));
    }

    #[test]
    fn test_from_dir_without_main_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sites/shop.yaml", "{}\n");
        let config = SitesConfig::from_dir(dir.path()).unwrap();
        assert_eq!(config.port, 7000);
        assert!(config.sites.contains_key("shop"));
    }

    #[test]
    fn test_from_dir_rejects_repeated_site() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "config.yaml", "sites:\n  shop: {}\n");
        write(dir.path(), "sites/shop.yaml", "{}\n");
        assert!(matches!(
            SitesConfig::from_dir(dir.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_dir_missing() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SitesConfig::from_dir(dir.path().join("nope")),
            Err(ConfigError::NotFound(_))
        ));
    }
}
