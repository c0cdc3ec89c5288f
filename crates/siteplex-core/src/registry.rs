//! Site registry
//!
//! Holds the live set of sites and three coexisting indexes over it:
//! - by name (source of truth, iterated in sorted order)
//! - by mounted path segment
//! - by bound host (`host:port`, `host` or `:port`)
//!
//! Path and host indexes store site names, never site state, so a binding
//! can only exist while its site is registered. A registry is either
//! indexed or in alone mode for its whole lifetime; alone mode serves a
//! single site and leaves the path/host indexes unused.
//!
//! Mutations take one write lock for all indexes, so readers never see a
//! half-applied add or remove. Notification hooks run synchronously after
//! the lock is released, which lets a hook mutate the registry (for example
//! to mount a new site under its own name).

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::site::Site;
use crate::{Error, Result};

/// Registry operating mode, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryMode {
    /// Many sites resolved by host or path
    Indexed,
    /// Exactly one site, resolution bypassed
    Alone,
}

pub type SiteHook = Arc<dyn Fn(&SiteRegistry, &Arc<Site>) + Send + Sync>;
pub type MountHook = Arc<dyn Fn(&SiteRegistry, &Arc<Site>, &str) + Send + Sync>;

#[derive(Default, Clone)]
struct Hooks {
    added: Vec<SiteHook>,
    post_added: Vec<SiteHook>,
    destroyed: Vec<SiteHook>,
    path_added: Vec<MountHook>,
    path_removed: Vec<MountHook>,
    host_added: Vec<MountHook>,
    host_removed: Vec<MountHook>,
}

#[derive(Default)]
struct Indexes {
    by_name: BTreeMap<String, Arc<Site>>,
    by_path: BTreeMap<String, String>,
    by_host: HashMap<String, String>,
}

enum State {
    Alone(Option<Arc<Site>>),
    Indexed(Indexes),
}

/// Indexed set of live sites
pub struct SiteRegistry {
    state: RwLock<State>,
    hooks: RwLock<Hooks>,
}

impl SiteRegistry {
    pub fn new(mode: RegistryMode) -> Self {
        let state = match mode {
            RegistryMode::Alone => State::Alone(None),
            RegistryMode::Indexed => State::Indexed(Indexes::default()),
        };
        Self {
            state: RwLock::new(state),
            hooks: RwLock::new(Hooks::default()),
        }
    }

    pub fn indexed() -> Self {
        Self::new(RegistryMode::Indexed)
    }

    pub fn alone() -> Self {
        Self::new(RegistryMode::Alone)
    }

    pub fn mode(&self) -> RegistryMode {
        match &*self.read() {
            State::Alone(_) => RegistryMode::Alone,
            State::Indexed(_) => RegistryMode::Indexed,
        }
    }

    pub fn is_alone(&self) -> bool {
        self.mode() == RegistryMode::Alone
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn hooks(&self) -> Hooks {
        self.hooks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn update_hooks(&self, f: impl FnOnce(&mut Hooks)) {
        f(&mut self
            .hooks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()));
    }

    // ---------------------------------------------------------------------
    // Notification hooks
    // ---------------------------------------------------------------------

    /// Called after a site is added
    pub fn on_add(&self, f: impl Fn(&SiteRegistry, &Arc<Site>) + Send + Sync + 'static) {
        self.update_hooks(|h| h.added.push(Arc::new(f)));
    }

    /// Called after every `on_add` hook has run
    pub fn on_post_add(&self, f: impl Fn(&SiteRegistry, &Arc<Site>) + Send + Sync + 'static) {
        self.update_hooks(|h| h.post_added.push(Arc::new(f)));
    }

    /// Called after a site has been removed and its databases closed
    pub fn on_destroy(&self, f: impl Fn(&SiteRegistry, &Arc<Site>) + Send + Sync + 'static) {
        self.update_hooks(|h| h.destroyed.push(Arc::new(f)));
    }

    pub fn on_path_add(
        &self,
        f: impl Fn(&SiteRegistry, &Arc<Site>, &str) + Send + Sync + 'static,
    ) {
        self.update_hooks(|h| h.path_added.push(Arc::new(f)));
    }

    pub fn on_path_remove(
        &self,
        f: impl Fn(&SiteRegistry, &Arc<Site>, &str) + Send + Sync + 'static,
    ) {
        self.update_hooks(|h| h.path_removed.push(Arc::new(f)));
    }

    pub fn on_host_add(
        &self,
        f: impl Fn(&SiteRegistry, &Arc<Site>, &str) + Send + Sync + 'static,
    ) {
        self.update_hooks(|h| h.host_added.push(Arc::new(f)));
    }

    pub fn on_host_remove(
        &self,
        f: impl Fn(&SiteRegistry, &Arc<Site>, &str) + Send + Sync + 'static,
    ) {
        self.update_hooks(|h| h.host_removed.push(Arc::new(f)));
    }

    fn fire(&self, hooks: &[SiteHook], site: &Arc<Site>) {
        for hook in hooks {
            hook(self, site);
        }
    }

    fn fire_mount(&self, hooks: &[MountHook], site: &Arc<Site>, key: &str) {
        for hook in hooks {
            hook(self, site, key);
        }
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Register a site
    ///
    /// # Errors
    /// - `Error::DuplicateSite` if the name is taken
    /// - `Error::AloneSiteOccupied` if an alone registry already has a site
    pub fn add(&self, site: Arc<Site>) -> Result<()> {
        {
            let mut state = self.write();
            match &mut *state {
                State::Alone(slot) => match slot {
                    Some(existing) if existing.name() == site.name() => {
                        return Err(Error::DuplicateSite(site.name().to_string()));
                    }
                    Some(existing) => {
                        return Err(Error::AloneSiteOccupied(existing.name().to_string()));
                    }
                    None => *slot = Some(site.clone()),
                },
                State::Indexed(idx) => match idx.by_name.entry(site.name().to_string()) {
                    Entry::Occupied(_) => {
                        return Err(Error::DuplicateSite(site.name().to_string()));
                    }
                    Entry::Vacant(v) => {
                        v.insert(site.clone());
                    }
                },
            }
        }

        debug!("[{}] registered", site.name());

        let hooks = self.hooks();
        self.fire(&hooks.added, &site);
        self.fire(&hooks.post_added, &site);
        Ok(())
    }

    /// Mount a registered site under a path segment
    ///
    /// Binding a segment to the site that already owns it is a no-op.
    ///
    /// # Errors
    /// - `Error::UnknownSite`, `Error::DuplicatePath`, `Error::AloneMode`
    /// - `Error::InvalidMount` for an empty segment or one containing `/`
    pub fn add_path(&self, site_name: &str, path: &str) -> Result<()> {
        let key = normalize_path(path)?;
        let site = {
            let mut state = self.write();
            let idx = indexed_mut(&mut state, "paths are not mounted")?;
            let site = idx
                .by_name
                .get(site_name)
                .cloned()
                .ok_or_else(|| Error::UnknownSite(site_name.to_string()))?;
            match idx.by_path.get(&key) {
                Some(owner) if owner == site_name => return Ok(()),
                Some(owner) => {
                    return Err(Error::DuplicatePath {
                        path: key,
                        site: owner.clone(),
                    });
                }
                None => {
                    idx.by_path.insert(key.clone(), site_name.to_string());
                }
            }
            site
        };

        self.fire_mount(&self.hooks().path_added, &site, &key);
        Ok(())
    }

    /// Bind a registered site to a host (`example.com:8080`, `example.com` or `:8080`)
    ///
    /// # Errors
    /// - `Error::UnknownSite`, `Error::DuplicateHost`, `Error::AloneMode`
    /// - `Error::InvalidMount` for an empty host
    pub fn add_host(&self, site_name: &str, host: &str) -> Result<()> {
        let key = normalize_host(host)?;
        let site = {
            let mut state = self.write();
            let idx = indexed_mut(&mut state, "hosts are not bound")?;
            let site = idx
                .by_name
                .get(site_name)
                .cloned()
                .ok_or_else(|| Error::UnknownSite(site_name.to_string()))?;
            match idx.by_host.get(&key) {
                Some(owner) if owner == site_name => return Ok(()),
                Some(owner) => {
                    return Err(Error::DuplicateHost {
                        host: key,
                        site: owner.clone(),
                    });
                }
                None => {
                    idx.by_host.insert(key.clone(), site_name.to_string());
                }
            }
            site
        };

        self.fire_mount(&self.hooks().host_added, &site, &key);
        Ok(())
    }

    /// Unmount a path segment, returning the site it pointed to
    pub fn remove_path(&self, path: &str) -> Option<Arc<Site>> {
        let key = normalize_path(path).ok()?;
        let site = {
            let mut state = self.write();
            let State::Indexed(idx) = &mut *state else {
                return None;
            };
            let owner = idx.by_path.remove(&key)?;
            idx.by_name.get(&owner).cloned()?
        };

        self.fire_mount(&self.hooks().path_removed, &site, &key);
        Some(site)
    }

    /// Unbind a host, returning the site it pointed to
    pub fn remove_host(&self, host: &str) -> Option<Arc<Site>> {
        let key = normalize_host(host).ok()?;
        let site = {
            let mut state = self.write();
            let State::Indexed(idx) = &mut *state else {
                return None;
            };
            let owner = idx.by_host.remove(&key)?;
            idx.by_name.get(&owner).cloned()?
        };

        self.fire_mount(&self.hooks().host_removed, &site, &key);
        Some(site)
    }

    /// Remove and destroy a site
    ///
    /// Drops every path and host binding of the site, closes its databases
    /// and then fires the destroy notification.
    ///
    /// # Errors
    /// - `Error::UnknownSite` if no such site is registered
    pub async fn remove(&self, name: &str) -> Result<Arc<Site>> {
        let (site, paths, hosts) = {
            let mut state = self.write();
            match &mut *state {
                State::Alone(slot) => match slot.take_if(|s| s.name() == name) {
                    Some(site) => (site, Vec::new(), Vec::new()),
                    None => return Err(Error::UnknownSite(name.to_string())),
                },
                State::Indexed(idx) => {
                    let site = idx
                        .by_name
                        .remove(name)
                        .ok_or_else(|| Error::UnknownSite(name.to_string()))?;
                    let paths = drain_owned(&mut idx.by_path, name);
                    let hosts: Vec<String> = idx
                        .by_host
                        .iter()
                        .filter(|(_, owner)| owner.as_str() == name)
                        .map(|(host, _)| host.clone())
                        .collect();
                    for host in &hosts {
                        idx.by_host.remove(host);
                    }
                    (site, paths, hosts)
                }
            }
        };

        let hooks = self.hooks();
        for path in &paths {
            self.fire_mount(&hooks.path_removed, &site, path);
        }
        for host in &hosts {
            self.fire_mount(&hooks.host_removed, &site, host);
        }

        site.close_databases().await;
        self.fire(&hooks.destroyed, &site);
        Ok(site)
    }

    // ---------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<Arc<Site>> {
        match &*self.read() {
            State::Alone(slot) => slot.as_ref().filter(|s| s.name() == name).cloned(),
            State::Indexed(idx) => idx.by_name.get(name).cloned(),
        }
    }

    pub fn get_by_path(&self, path: &str) -> Option<Arc<Site>> {
        let key = normalize_path(path).ok()?;
        match &*self.read() {
            State::Alone(_) => None,
            State::Indexed(idx) => idx
                .by_path
                .get(&key)
                .and_then(|name| idx.by_name.get(name))
                .cloned(),
        }
    }

    /// Exact host lookup; port/subdomain fallbacks belong to the resolver
    pub fn get_by_host(&self, host: &str) -> Option<Arc<Site>> {
        let key = normalize_host(host).ok()?;
        match &*self.read() {
            State::Alone(_) => None,
            State::Indexed(idx) => idx
                .by_host
                .get(&key)
                .and_then(|name| idx.by_name.get(name))
                .cloned(),
        }
    }

    /// The site of an alone registry
    pub fn site(&self) -> Option<Arc<Site>> {
        match &*self.read() {
            State::Alone(slot) => slot.clone(),
            State::Indexed(_) => None,
        }
    }

    pub fn has_sites(&self) -> bool {
        !self.is_empty()
    }

    pub fn len(&self) -> usize {
        match &*self.read() {
            State::Alone(slot) => usize::from(slot.is_some()),
            State::Indexed(idx) => idx.by_name.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all sites sorted by name
    pub fn sites(&self) -> Vec<Arc<Site>> {
        match &*self.read() {
            State::Alone(slot) => slot.iter().cloned().collect(),
            State::Indexed(idx) => idx.by_name.values().cloned().collect(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.sites().iter().map(|s| s.name().to_string()).collect()
    }

    /// Mounted paths sorted by segment
    pub fn paths(&self) -> Vec<(String, Arc<Site>)> {
        match &*self.read() {
            State::Alone(_) => Vec::new(),
            State::Indexed(idx) => idx
                .by_path
                .iter()
                .filter_map(|(path, name)| {
                    idx.by_name.get(name).map(|s| (path.clone(), s.clone()))
                })
                .collect(),
        }
    }

    /// Bound hosts sorted by host
    pub fn hosts(&self) -> Vec<(String, Arc<Site>)> {
        let mut hosts: Vec<(String, Arc<Site>)> = match &*self.read() {
            State::Alone(_) => Vec::new(),
            State::Indexed(idx) => idx
                .by_host
                .iter()
                .filter_map(|(host, name)| {
                    idx.by_name.get(name).map(|s| (host.clone(), s.clone()))
                })
                .collect(),
        };
        hosts.sort_by(|a, b| a.0.cmp(&b.0));
        hosts
    }

    /// Visit every site in name order
    ///
    /// The callback returns `Ok(ControlFlow::Break(()))` to stop early
    /// without an error; the first `Err` stops iteration and is returned.
    /// The callback runs on a snapshot, so it may mutate the registry.
    pub fn each<E>(
        &self,
        mut f: impl FnMut(&Arc<Site>) -> std::result::Result<ControlFlow<()>, E>,
    ) -> std::result::Result<(), E> {
        for site in self.sites() {
            if f(&site)?.is_break() {
                break;
            }
        }
        Ok(())
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::indexed()
    }
}

fn indexed_mut<'a>(state: &'a mut State, what: &str) -> Result<&'a mut Indexes> {
    match state {
        State::Indexed(idx) => Ok(idx),
        State::Alone(_) => Err(Error::AloneMode(what.to_string())),
    }
}

fn drain_owned(map: &mut BTreeMap<String, String>, owner: &str) -> Vec<String> {
    let keys: Vec<String> = map
        .iter()
        .filter(|(_, o)| o.as_str() == owner)
        .map(|(k, _)| k.clone())
        .collect();
    for key in &keys {
        map.remove(key);
    }
    keys
}

fn normalize_path(path: &str) -> Result<String> {
    let key = path.trim_matches('/');
    if key.is_empty() || key.contains('/') {
        return Err(Error::InvalidMount(format!(
            "path {path:?} must be a single non-empty segment"
        )));
    }
    Ok(key.to_string())
}

fn normalize_host(host: &str) -> Result<String> {
    let key = host.trim().to_ascii_lowercase();
    if key.is_empty() || key == ":" {
        return Err(Error::InvalidMount(format!("host {host:?} is empty")));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn site(name: &str) -> Arc<Site> {
        Arc::new(Site::builder(name).build().unwrap())
    }

    fn event_log(registry: &SiteRegistry) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        registry.on_add(move |_, s| l.lock().unwrap().push(format!("add:{}", s.name())));
        let l = log.clone();
        registry.on_post_add(move |_, s| l.lock().unwrap().push(format!("post:{}", s.name())));
        let l = log.clone();
        registry.on_destroy(move |_, s| l.lock().unwrap().push(format!("destroy:{}", s.name())));
        let l = log.clone();
        registry.on_path_add(move |_, s, p| {
            l.lock().unwrap().push(format!("path+:{}:{}", s.name(), p))
        });
        let l = log.clone();
        registry.on_path_remove(move |_, s, p| {
            l.lock().unwrap().push(format!("path-:{}:{}", s.name(), p))
        });
        let l = log.clone();
        registry.on_host_add(move |_, s, h| {
            l.lock().unwrap().push(format!("host+:{}:{}", s.name(), h))
        });
        let l = log.clone();
        registry.on_host_remove(move |_, s, h| {
            l.lock().unwrap().push(format!("host-:{}:{}", s.name(), h))
        });
        log
    }

    #[test]
    fn test_add_fires_added_then_post_added() {
        let registry = SiteRegistry::indexed();
        let log = event_log(&registry);

        registry.add(site("shop")).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["add:shop", "post:shop"]);
        assert!(registry.get("shop").is_some());
    }

    #[test]
    fn test_duplicate_site_rejected() {
        let registry = SiteRegistry::indexed();
        registry.add(site("shop")).unwrap();

        let err = registry.add(site("shop")).unwrap_err();
        assert!(matches!(err, Error::DuplicateSite(ref n) if n == "shop"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_path_unknown_site() {
        let registry = SiteRegistry::indexed();
        let err = registry.add_path("ghost", "g").unwrap_err();
        assert!(matches!(err, Error::UnknownSite(_)));
    }

    #[test]
    fn test_duplicate_path_keeps_first_binding() {
        let registry = SiteRegistry::indexed();
        registry.add(site("a")).unwrap();
        registry.add(site("b")).unwrap();
        registry.add_path("a", "shared").unwrap();

        let err = registry.add_path("b", "/shared/").unwrap_err();
        assert!(matches!(err, Error::DuplicatePath { ref site, .. } if site == "a"));
        assert_eq!(registry.get_by_path("shared").unwrap().name(), "a");
    }

    #[test]
    fn test_rebinding_same_site_is_noop() {
        let registry = SiteRegistry::indexed();
        let log = event_log(&registry);
        registry.add(site("a")).unwrap();
        registry.add_path("a", "p").unwrap();
        registry.add_path("a", "p").unwrap();
        registry.add_host("a", "a.example.com").unwrap();
        registry.add_host("a", "A.example.com").unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["add:a", "post:a", "path+:a:p", "host+:a:a.example.com"]
        );
    }

    #[test]
    fn test_duplicate_host_keeps_first_binding() {
        let registry = SiteRegistry::indexed();
        registry.add(site("a")).unwrap();
        registry.add(site("b")).unwrap();
        registry.add_host("a", "example.com:8080").unwrap();

        let err = registry.add_host("b", "example.com:8080").unwrap_err();
        assert!(matches!(err, Error::DuplicateHost { ref site, .. } if site == "a"));
        assert_eq!(registry.get_by_host("example.com:8080").unwrap().name(), "a");
    }

    #[test]
    fn test_invalid_mount_keys_rejected() {
        let registry = SiteRegistry::indexed();
        registry.add(site("a")).unwrap();
        assert!(registry.add_path("a", "/").is_err());
        assert!(registry.add_path("a", "x/y").is_err());
        assert!(registry.add_host("a", "  ").is_err());
    }

    #[test]
    fn test_remove_path_and_host_fire_notifications() {
        let registry = SiteRegistry::indexed();
        let log = event_log(&registry);
        registry.add(site("a")).unwrap();
        registry.add_path("a", "p").unwrap();
        registry.add_host("a", ":9000").unwrap();

        assert_eq!(registry.remove_path("p").unwrap().name(), "a");
        assert_eq!(registry.remove_host(":9000").unwrap().name(), "a");
        assert!(registry.remove_path("p").is_none());
        assert!(registry.get_by_path("p").is_none());
        assert!(registry.get_by_host(":9000").is_none());

        let log = log.lock().unwrap();
        assert!(log.contains(&"path-:a:p".to_string()));
        assert!(log.contains(&"host-:a::9000".to_string()));
    }

    #[tokio::test]
    async fn test_remove_drops_bindings_and_fires_destroy() {
        let registry = SiteRegistry::indexed();
        let log = event_log(&registry);
        registry.add(site("a")).unwrap();
        registry.add_path("a", "p").unwrap();
        registry.add_host("a", "a.test").unwrap();

        let removed = registry.remove("a").await.unwrap();
        assert_eq!(removed.name(), "a");
        assert!(registry.get("a").is_none());
        assert!(registry.get_by_path("p").is_none());
        assert!(registry.get_by_host("a.test").is_none());

        let log = log.lock().unwrap();
        assert_eq!(log.last().unwrap(), "destroy:a");
        assert!(log.contains(&"path-:a:p".to_string()));
        assert!(log.contains(&"host-:a:a.test".to_string()));
    }

    #[tokio::test]
    async fn test_remove_unknown_site() {
        let registry = SiteRegistry::indexed();
        assert!(matches!(
            registry.remove("ghost").await.unwrap_err(),
            Error::UnknownSite(_)
        ));
    }

    #[test]
    fn test_each_is_sorted_and_stops() {
        let registry = SiteRegistry::indexed();
        for name in ["c", "a", "b"] {
            registry.add(site(name)).unwrap();
        }

        let mut seen = Vec::new();
        registry
            .each(|s| {
                seen.push(s.name().to_string());
                Ok::<_, Error>(ControlFlow::Continue(()))
            })
            .unwrap();
        assert_eq!(seen, vec!["a", "b", "c"]);

        let mut seen = Vec::new();
        registry
            .each(|s| {
                seen.push(s.name().to_string());
                if s.name() == "b" {
                    Ok::<_, Error>(ControlFlow::Break(()))
                } else {
                    Ok(ControlFlow::Continue(()))
                }
            })
            .unwrap();
        assert_eq!(seen, vec!["a", "b"]);

        let result = registry.each(|s| {
            if s.name() == "a" {
                Err("boom")
            } else {
                Ok(ControlFlow::Continue(()))
            }
        });
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn test_post_add_hook_can_mount_site() {
        let registry = SiteRegistry::indexed();
        registry.on_post_add(|reg, s| {
            reg.add_path(s.name(), s.name()).unwrap();
        });

        registry.add(site("shop")).unwrap();
        assert_eq!(registry.get_by_path("shop").unwrap().name(), "shop");
    }

    #[test]
    fn test_alone_mode_single_site() {
        let registry = SiteRegistry::alone();
        assert!(registry.is_alone());
        assert!(registry.site().is_none());
        assert!(!registry.has_sites());

        registry.add(site("only")).unwrap();
        assert_eq!(registry.site().unwrap().name(), "only");
        assert!(matches!(
            registry.add(site("other")).unwrap_err(),
            Error::AloneSiteOccupied(_)
        ));
        assert!(matches!(
            registry.add_path("only", "only").unwrap_err(),
            Error::AloneMode(_)
        ));
        assert!(registry.get_by_path("only").is_none());
        assert_eq!(registry.names(), vec!["only"]);
    }

    #[test]
    fn test_paths_sorted() {
        let registry = SiteRegistry::indexed();
        registry.add(site("a")).unwrap();
        registry.add(site("b")).unwrap();
        registry.add_path("b", "zeta").unwrap();
        registry.add_path("a", "alpha").unwrap();

        let paths: Vec<(String, String)> = registry
            .paths()
            .into_iter()
            .map(|(p, s)| (p, s.name().to_string()))
            .collect();
        assert_eq!(
            paths,
            vec![("alpha".into(), "a".into()), ("zeta".into(), "b".into())]
        );
    }
}
