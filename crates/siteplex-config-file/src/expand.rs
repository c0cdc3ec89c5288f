//! Placeholder expansion in database URLs and site paths
//!
//! `${SITE_NAME}`, `${DATA_DIR}` and `${HOME}` are always known; any other
//! variable is read from the environment. Unknown variables are left as
//! written, and a leading `~` expands to the home directory.

use std::path::PathBuf;

use crate::config::SiteConfig;

pub struct Expander<'a> {
    site_name: &'a str,
    data_dir: &'a str,
}

impl<'a> Expander<'a> {
    pub fn new(site_name: &'a str, data_dir: &'a str) -> Self {
        Self {
            site_name,
            data_dir,
        }
    }

    pub fn expand(&self, input: &str) -> String {
        shellexpand::full_with_context_no_errors(input, home_dir, |var| self.lookup(var))
            .into_owned()
    }

    pub fn expand_site(&self, site: &mut SiteConfig) {
        if let Some(public) = &site.public {
            site.public = Some(PathBuf::from(self.expand(&public.to_string_lossy())));
        }
        for db in site.databases.values_mut() {
            db.url = self.expand(&db.url);
            if let Some(dir) = &db.migrations {
                db.migrations = Some(PathBuf::from(self.expand(&dir.to_string_lossy())));
            }
        }
    }

    fn lookup(&self, var: &str) -> Option<String> {
        match var {
            "SITE_NAME" => Some(self.site_name.to_string()),
            "DATA_DIR" => Some(shellexpand::tilde(self.data_dir).into_owned()),
            "HOME" => home_dir(),
            _ => std::env::var(var).ok(),
        }
    }
}

fn home_dir() -> Option<String> {
    dirs::home_dir().map(|home| home.to_string_lossy().into_owned())
}
