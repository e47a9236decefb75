//! Extension to builder dispatch.
//!
//! Each extension keeps an ordered list of builders. The last entry is
//! authoritative; unregistering it exposes the previous one.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use vp_proxy::Proxy;

use crate::builder::{ProxyBuilder, extension_of, normalize_extension};
use crate::{RegistryError, RegistryResult};

type BuilderList = Vec<Arc<dyn ProxyBuilder>>;

fn same_builder(a: &Arc<dyn ProxyBuilder>, b: &Arc<dyn ProxyBuilder>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[derive(Default)]
pub struct ProxyRegistry {
    builders: Mutex<BTreeMap<String, BuilderList>>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, BuilderList>> {
        match self.builders.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make `builder` the most recent builder for each of its extensions.
    ///
    /// Registering a builder again moves it to the end of every list.
    /// Returns whether any extension was affected.
    pub fn register(&self, builder: Arc<dyn ProxyBuilder>) -> bool {
        let mut map = self.lock();
        let mut affected = false;
        for extension in builder.extensions() {
            let extension = normalize_extension(&extension);
            if extension.is_empty() {
                continue;
            }
            let list = map.entry(extension.clone()).or_default();
            list.retain(|b| !same_builder(b, &builder));
            list.push(builder.clone());
            debug!(builder = builder.name(), %extension, "registered proxy builder");
            affected = true;
        }
        affected
    }

    /// Remove `builder` from every extension. Empty lists are dropped.
    pub fn unregister(&self, builder: &Arc<dyn ProxyBuilder>) -> bool {
        let mut map = self.lock();
        let mut removed = false;
        map.retain(|extension, list| {
            let before = list.len();
            list.retain(|b| !same_builder(b, builder));
            if list.len() != before {
                debug!(builder = builder.name(), %extension, "unregistered proxy builder");
                removed = true;
            }
            !list.is_empty()
        });
        removed
    }

    /// Authoritative builder for an extension, if any.
    pub fn factory_for_extension(&self, extension: &str) -> Option<Arc<dyn ProxyBuilder>> {
        self.lock()
            .get(&normalize_extension(extension))
            .and_then(|list| list.last().cloned())
    }

    /// Authoritative builder for `uri`'s extension.
    pub fn factory(&self, uri: &Path) -> Option<Arc<dyn ProxyBuilder>> {
        extension_of(uri).and_then(|ext| self.factory_for_extension(&ext))
    }

    /// Build a proxy for `uri` with its authoritative builder.
    ///
    /// # Errors
    ///
    /// [`RegistryError::MissingArgument`] for an empty path and
    /// [`RegistryError::UnsupportedInput`] when no builder handles the
    /// extension. Builder failures are passed through.
    pub fn create_proxy(&self, uri: &Path) -> RegistryResult<Proxy> {
        if uri.as_os_str().is_empty() {
            return Err(RegistryError::MissingArgument { what: "uri" });
        }
        let builder = self.factory(uri).ok_or_else(|| RegistryError::UnsupportedInput {
            uri: uri.display().to_string(),
        })?;
        debug!(builder = builder.name(), uri = %uri.display(), "creating proxy");
        builder.create_proxy(uri)
    }

    /// Every extension with at least one registered builder.
    pub fn extensions(&self) -> BTreeSet<String> {
        self.lock().keys().cloned().collect()
    }

    /// Names of the builders registered for an extension, oldest first.
    pub fn builder_names(&self, extension: &str) -> Vec<String> {
        self.lock()
            .get(&normalize_extension(extension))
            .map(|list| list.iter().map(|b| b.name().to_string()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vp_core::{ProxyOptions, VpResult};
    use vp_proxy::BaseStrategy;

    struct Named {
        name: &'static str,
        extensions: &'static [&'static str],
    }

    impl ProxyBuilder for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn extensions(&self) -> BTreeSet<String> {
            self.extensions.iter().map(|e| e.to_string()).collect()
        }

        fn build(&self, uri: &Path) -> VpResult<Proxy> {
            Proxy::new(uri, Box::new(BaseStrategy), ProxyOptions::default())
        }
    }

    fn builder(name: &'static str, extensions: &'static [&'static str]) -> Arc<dyn ProxyBuilder> {
        Arc::new(Named { name, extensions })
    }

    fn authoritative(registry: &ProxyRegistry, uri: &str) -> Option<String> {
        registry.factory(Path::new(uri)).map(|b| b.name().to_string())
    }

    #[test]
    fn most_recent_builder_wins_and_falls_back() {
        let registry = ProxyRegistry::new();
        let b1 = builder("b1", &["ex"]);
        let b2 = builder("b2", &["ex"]);

        assert!(registry.register(b1.clone()));
        assert!(registry.register(b2.clone()));
        assert_eq!(authoritative(&registry, "mesh.ex").as_deref(), Some("b2"));

        assert!(registry.unregister(&b2));
        assert_eq!(authoritative(&registry, "mesh.ex").as_deref(), Some("b1"));

        assert!(registry.unregister(&b1));
        assert_eq!(authoritative(&registry, "mesh.ex"), None);
        assert!(registry.extensions().is_empty());
    }

    #[test]
    fn reregistering_promotes_builder() {
        let registry = ProxyRegistry::new();
        let b1 = builder("b1", &["ex"]);
        let b2 = builder("b2", &["ex"]);
        registry.register(b1.clone());
        registry.register(b2);
        registry.register(b1);

        assert_eq!(registry.builder_names("ex"), vec!["b2", "b1"]);
        assert_eq!(authoritative(&registry, "mesh.ex").as_deref(), Some("b1"));
    }

    #[test]
    fn builders_with_equal_names_are_distinct() {
        let registry = ProxyRegistry::new();
        let first = builder("same", &["ex"]);
        let second = builder("same", &["ex"]);
        registry.register(first.clone());
        registry.register(second);

        assert!(registry.unregister(&first));
        assert_eq!(registry.builder_names("ex").len(), 1);
    }

    #[test]
    fn register_and_unregister_report_effect() {
        let registry = ProxyRegistry::new();
        let none = builder("none", &[]);
        let blank = builder("blank", &["", "."]);
        let vtu = builder("vtu", &["vtu"]);

        assert!(!registry.register(none));
        assert!(!registry.register(blank));
        assert!(!registry.unregister(&vtu));
    }

    #[test]
    fn extensions_are_normalized_and_listed() {
        let registry = ProxyRegistry::new();
        registry.register(builder("exodus", &[".E", "exo"]));
        registry.register(builder("vtk", &["VTU", "vtp"]));

        let extensions: Vec<String> = registry.extensions().into_iter().collect();
        assert_eq!(extensions, vec!["e", "exo", "vtp", "vtu"]);
        assert_eq!(authoritative(&registry, "/data/wave.E").as_deref(), Some("exodus"));
        assert_eq!(authoritative(&registry, "/data/grid.vtu").as_deref(), Some("vtk"));
    }

    #[test]
    fn create_proxy_reports_missing_and_unsupported() {
        let registry = ProxyRegistry::new();
        registry.register(builder("exodus", &["exo"]));

        let err = registry.create_proxy(Path::new("")).err().unwrap();
        assert!(matches!(err, RegistryError::MissingArgument { .. }));

        let err = registry.create_proxy(Path::new("/data/mesh")).err().unwrap();
        assert!(matches!(err, RegistryError::UnsupportedInput { .. }));

        let err = registry.create_proxy(Path::new("/data/mesh.vtu")).err().unwrap();
        assert!(matches!(err, RegistryError::UnsupportedInput { .. }));

        let proxy = registry.create_proxy(Path::new("/data/can.exo")).unwrap();
        assert_eq!(proxy.uri(), Path::new("/data/can.exo"));
    }

    #[test]
    fn registry_is_shared_across_threads() {
        let registry = ProxyRegistry::new();
        std::thread::scope(|s| {
            for i in 0..4 {
                let registry = &registry;
                s.spawn(move || {
                    let b = builder(if i % 2 == 0 { "even" } else { "odd" }, &["ex"]);
                    registry.register(b.clone());
                    registry.factory_for_extension("ex");
                    registry.unregister(&b);
                });
            }
        });
        assert!(registry.extensions().is_empty());
    }
}
