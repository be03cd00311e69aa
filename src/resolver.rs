//! Framework resolver.
//!
//! Maps framework SAIDs to parsed [`GovernanceFramework`]s and walks
//! supersession lineages.
//!
//! ## Cache contract
//!
//! SAIDs are content addresses, so a cached framework is valid forever.
//! Inserts are insert-if-absent: concurrent misses on the same SAID may both
//! fetch and parse, but every caller receives the one `Arc` that won.
//!
//! ## Chain walk
//!
//! ```text
//!   descendants (via forward index)      ancestors (via `supersedes`)
//!   C  ←──────────  B  ──────────────────→  A
//!   newest        start                   oldest
//! ```
//!
//! Both directions are iterative, guarded by a visited set and bounded by
//! [`ResolverConfig::max_chain_length`].

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::config::ResolverConfig;
use crate::store::CredentialSource;
use crate::types::framework::GovernanceFramework;

/// One supersession lineage, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionChain {
    /// Versions from newest to oldest.
    pub versions: Vec<Arc<GovernanceFramework>>,
}

impl VersionChain {
    /// The newest version.
    pub fn active(&self) -> Option<&Arc<GovernanceFramework>> {
        self.versions.first()
    }

    /// SAID of the newest version.
    pub fn active_said(&self) -> Option<&str> {
        self.active().map(|f| f.said.as_str())
    }

    /// The oldest version.
    pub fn root(&self) -> Option<&Arc<GovernanceFramework>> {
        self.versions.last()
    }

    /// Number of versions.
    pub fn depth(&self) -> usize {
        self.versions.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Whether `said` is anywhere in the chain.
    pub fn contains(&self, said: &str) -> bool {
        self.versions.iter().any(|v| v.said == said)
    }

    /// The version addressed by `said`.
    pub fn get_version(&self, said: &str) -> Option<&Arc<GovernanceFramework>> {
        self.versions.iter().find(|v| v.said == said)
    }

    /// All SAIDs, newest first.
    pub fn saids(&self) -> Vec<&str> {
        self.versions.iter().map(|v| v.said.as_str()).collect()
    }
}

/// Content-addressed framework cache plus forward supersession index.
pub struct FrameworkResolver {
    source: Option<Arc<dyn CredentialSource>>,
    config: ResolverConfig,
    cache: RwLock<HashMap<String, Arc<GovernanceFramework>>>,
    /// prior SAID → successor SAID
    superseded_by: RwLock<HashMap<String, String>>,
}

impl Default for FrameworkResolver {
    fn default() -> Self {
        Self::detached()
    }
}

impl FrameworkResolver {
    /// Resolver backed by `source`.
    pub fn new(source: impl CredentialSource + 'static) -> Self {
        Self::with_source(Arc::new(source))
    }

    /// Resolver backed by a shared source.
    pub fn with_source(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            source: Some(source),
            ..Self::detached()
        }
    }

    /// Resolver without a source; only registered frameworks resolve.
    pub fn detached() -> Self {
        Self {
            source: None,
            config: ResolverConfig::default(),
            cache: RwLock::new(HashMap::new()),
            superseded_by: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the configuration. A `max_chain_length` of zero is raised to one.
    pub fn with_config(mut self, mut config: ResolverConfig) -> Self {
        if config.max_chain_length == 0 {
            warn!("max_chain_length of 0 raised to 1");
            config.max_chain_length = 1;
        }
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `said`, fetching and parsing on a cache miss.
    ///
    /// Fetch errors, parse errors and SAID mismatches all read as absent.
    pub fn resolve(&self, said: &str) -> Option<Arc<GovernanceFramework>> {
        if let Some(hit) = self.cache.read().get(said) {
            trace!(said, "framework cache hit");
            return Some(Arc::clone(hit));
        }

        let source = self.source.as_ref()?;
        debug!(said, "framework cache miss");

        let raw = match source.fetch(said) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(said, "framework not found in source");
                return None;
            }
            Err(e) => {
                warn!(said, error = %e, "credential fetch failed");
                return None;
            }
        };

        let framework = match GovernanceFramework::from_credential(raw) {
            Ok(framework) => framework,
            Err(e) => {
                warn!(said, error = %e, "credential is not a governance framework");
                return None;
            }
        };

        if framework.said != said {
            warn!(said, found = %framework.said, "credential SAID does not match request");
            return None;
        }

        Some(self.insert(Arc::new(framework)))
    }

    /// Add a framework without a fetch round trip.
    ///
    /// Returns the cached instance, which is the existing one if the SAID was
    /// already known.
    pub fn register(&self, framework: impl Into<Arc<GovernanceFramework>>) -> Arc<GovernanceFramework> {
        let framework = self.insert(framework.into());
        debug!(said = %framework.said, version = %framework.version(), "framework registered");
        framework
    }

    fn insert(&self, framework: Arc<GovernanceFramework>) -> Arc<GovernanceFramework> {
        let cached = {
            let mut cache = self.cache.write();
            Arc::clone(
                cache
                    .entry(framework.said.clone())
                    .or_insert_with(|| Arc::clone(&framework)),
            )
        };
        if let Some(prior) = &cached.supersedes {
            let mut index = self.superseded_by.write();
            let successor = index.entry(prior.clone()).or_insert_with(|| cached.said.clone());
            if *successor != cached.said {
                warn!(prior = %prior, recorded = %successor, ignored = %cached.said, "supersession fork");
            }
        }
        cached
    }

    /// Record that `new_said` supersedes `old_said`.
    pub fn register_supersession(&self, new_said: &str, old_said: &str) {
        self.superseded_by
            .write()
            .insert(old_said.to_string(), new_said.to_string());
        debug!(new = new_said, old = old_said, "supersession registered");
    }

    /// Recorded successor of `said`.
    pub fn superseded_by(&self, said: &str) -> Option<String> {
        self.superseded_by.read().get(said).cloned()
    }

    /// Whether `said` is cached.
    pub fn is_cached(&self, said: &str) -> bool {
        self.cache.read().contains_key(said)
    }

    /// Number of cached frameworks.
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Drop every cached framework and the forward index.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
        self.superseded_by.write().clear();
    }

    /// The full lineage containing `said`, newest first. Empty if `said`
    /// does not resolve.
    pub fn resolve_chain(&self, said: &str) -> VersionChain {
        let Some(start) = self.resolve(said) else {
            return VersionChain::default();
        };
        let limit = self.config.max_chain_length;
        let mut visited: HashSet<String> = HashSet::from([start.said.clone()]);

        let mut ancestors = Vec::new();
        let mut cursor = start.supersedes.clone();
        while let Some(prior) = cursor.take() {
            if ancestors.len() >= limit {
                warn!(said, limit, "ancestor walk hit chain length limit");
                break;
            }
            if !visited.insert(prior.clone()) {
                warn!(said, at = %prior, "supersession cycle");
                break;
            }
            let Some(framework) = self.resolve(&prior) else {
                trace!(said, missing = %prior, "ancestor unresolved");
                break;
            };
            trace!(said, ancestor = %framework.said, "ancestor");
            cursor = framework.supersedes.clone();
            ancestors.push(framework);
        }

        let mut descendants = Vec::new();
        let mut current = start.said.clone();
        while let Some(next) = self.superseded_by(&current) {
            if descendants.len() >= limit {
                warn!(said, limit, "descendant walk hit chain length limit");
                break;
            }
            if !visited.insert(next.clone()) {
                warn!(said, at = %next, "supersession cycle");
                break;
            }
            let Some(framework) = self.resolve(&next) else {
                trace!(said, missing = %next, "descendant unresolved");
                break;
            };
            if framework.supersedes.as_deref().is_some_and(|s| s != current) {
                warn!(said, successor = %next, "successor declares a different prior version");
                break;
            }
            trace!(said, descendant = %framework.said, "descendant");
            current = framework.said.clone();
            descendants.push(framework);
        }

        let mut versions = Vec::with_capacity(descendants.len() + 1 + ancestors.len());
        versions.extend(descendants.into_iter().rev());
        versions.push(start);
        versions.extend(ancestors);
        VersionChain { versions }
    }

    /// Head of the lineage containing `said`.
    pub fn resolve_active(&self, said: &str) -> Option<Arc<GovernanceFramework>> {
        self.resolve_chain(said).active().cloned()
    }
}

impl std::fmt::Debug for FrameworkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkResolver")
            .field("has_source", &self.source.is_some())
            .field("config", &self.config)
            .field("cached", &self.cached_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCredentialStore;
    use crate::types::framework::{ContentSaid, FrameworkDraft};
    use serde_json::json;

    fn version(version: &str, prior: Option<&str>) -> GovernanceFramework {
        let mut draft = FrameworkDraft::new("fw", version).with_steward("Esteward");
        if let Some(prior) = prior {
            draft = draft.superseding(prior);
        }
        draft.issue(&ContentSaid)
    }

    fn lineage() -> (Arc<InMemoryCredentialStore>, [GovernanceFramework; 3]) {
        let a = version("1.0.0", None);
        let b = version("1.1.0", Some(&a.said));
        let c = version("1.2.0", Some(&b.said));
        let store = Arc::new(InMemoryCredentialStore::new());
        for fw in [&a, &b, &c] {
            store.insert(fw.said.clone(), fw.raw.clone());
        }
        (store, [a, b, c])
    }

    #[test]
    fn test_resolve_caches() {
        let (store, [a, _, _]) = lineage();
        let resolver = FrameworkResolver::with_source(store.clone());
        let first = resolver.resolve(&a.said).unwrap();
        let second = resolver.resolve(&a.said).unwrap();
        assert_eq!(*first, *second);
        assert_eq!(store.fetch_count(), 1);
        assert!(resolver.is_cached(&a.said));
    }

    #[test]
    fn test_resolve_missing_and_malformed() {
        let store = InMemoryCredentialStore::new();
        store.insert("Ebad", json!({"d": "Ebad", "a": "not an object"}));
        store.insert("Eother", json!({"d": "Edifferent", "a": {}}));
        let resolver = FrameworkResolver::new(store);
        assert!(resolver.resolve("Emissing").is_none());
        assert!(resolver.resolve("Ebad").is_none());
        assert!(resolver.resolve("Eother").is_none());
        assert_eq!(resolver.cached_count(), 0);
    }

    #[test]
    fn test_resolve_source_error_is_absent() {
        let (store, [a, _, _]) = lineage();
        store.set_unavailable(true);
        let resolver = FrameworkResolver::with_source(store);
        assert!(resolver.resolve(&a.said).is_none());
    }

    #[test]
    fn test_detached_resolver_only_serves_registered() {
        let resolver = FrameworkResolver::detached();
        let a = version("1.0.0", None);
        assert!(resolver.resolve(&a.said).is_none());
        resolver.register(a.clone());
        assert_eq!(resolver.resolve(&a.said).as_deref(), Some(&a));
    }

    #[test]
    fn test_register_keeps_first_instance() {
        let resolver = FrameworkResolver::detached();
        let a = version("1.0.0", None);
        let first = resolver.register(a.clone());
        let second = resolver.register(a);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_chain_from_every_member() {
        let (store, [a, b, c]) = lineage();
        for start in [&a, &b, &c] {
            let resolver = FrameworkResolver::with_source(store.clone());
            // Descendants are only discoverable once resolved.
            resolver.resolve(&c.said);
            resolver.resolve(&b.said);
            let chain = resolver.resolve_chain(&start.said);
            assert_eq!(chain.saids(), vec![c.said.as_str(), b.said.as_str(), a.said.as_str()]);
            assert_eq!(chain.active_said(), Some(c.said.as_str()));
            assert_eq!(chain.root().map(|f| f.said.as_str()), Some(a.said.as_str()));
        }
    }

    #[test]
    fn test_chain_helpers() {
        let (store, [a, b, c]) = lineage();
        let resolver = FrameworkResolver::with_source(store);
        let chain = resolver.resolve_chain(&c.said);
        assert_eq!(chain.depth(), 3);
        assert!(chain.contains(&b.said));
        assert_eq!(chain.get_version(&a.said).map(|f| f.version()), Some("1.0.0"));
        assert!(chain.get_version("Enope").is_none());
    }

    #[test]
    fn test_chain_of_unknown_is_empty() {
        let resolver = FrameworkResolver::detached();
        let chain = resolver.resolve_chain("Enope");
        assert!(chain.is_empty());
        assert!(chain.active().is_none());
        assert!(resolver.resolve_active("Enope").is_none());
    }

    #[test]
    fn test_self_cycle_terminates() {
        let resolver = FrameworkResolver::detached();
        let raw = json!({"d": "Eloop", "a": {"version": "1.0.0"}, "e": {"supersedes": {"d": "Eloop"}}});
        resolver.register(GovernanceFramework::from_credential(raw).unwrap());
        let chain = resolver.resolve_chain("Eloop");
        assert_eq!(chain.saids(), vec!["Eloop"]);
    }

    #[test]
    fn test_manual_supersession() {
        let resolver = FrameworkResolver::detached();
        let a = version("1.0.0", None);
        let b = version("2.0.0", None);
        resolver.register(a.clone());
        resolver.register(b.clone());
        resolver.register_supersession(&b.said, &a.said);
        assert_eq!(resolver.superseded_by(&a.said), Some(b.said.clone()));
        assert_eq!(resolver.resolve_active(&a.said).map(|f| f.said.clone()), Some(b.said));
    }

    #[test]
    fn test_chain_length_limit() {
        let (store, [_, _, c]) = lineage();
        let resolver = FrameworkResolver::with_source(store)
            .with_config(ResolverConfig { max_chain_length: 1 });
        assert_eq!(resolver.resolve_chain(&c.said).depth(), 2);
    }

    #[test]
    fn test_zero_chain_length_still_walks() {
        let (store, [_, b, c]) = lineage();
        let resolver = FrameworkResolver::with_source(store)
            .with_config(ResolverConfig { max_chain_length: 0 });
        assert_eq!(resolver.config().max_chain_length, 1);
        let chain = resolver.resolve_chain(&c.said);
        assert_eq!(chain.saids(), vec![c.said.as_str(), b.said.as_str()]);
    }

    #[test]
    fn test_clear_cache() {
        let (store, [a, b, _]) = lineage();
        let resolver = FrameworkResolver::with_source(store);
        resolver.resolve(&b.said);
        assert!(resolver.superseded_by(&a.said).is_some());
        resolver.clear_cache();
        assert!(!resolver.is_cached(&b.said));
        assert!(resolver.superseded_by(&a.said).is_none());
    }
}
