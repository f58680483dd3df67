//! Extension registry with an eagerly rebuilt, priority-sorted view.
//!
//! Registration is rare and dispatch is frequent, so every `register` and
//! `unregister` rebuilds the sorted view and publishes it as a fresh
//! `Arc<[Registration]>`. A dispatch clones that `Arc` once and walks it,
//! so it sees either the view before a concurrent rebuild or the one after,
//! never a half-built one.

use muster_core::{Extension, RegistryError};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockWriteGuard},
};

/// A registered extension with its resolved ordering keys.
#[derive(Clone)]
pub struct Registration {
    name: Arc<str>,
    priority: i32,
    sequence: u64,
    extension: Arc<dyn Extension>,
}

impl Registration {
    /// Unique extension name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Priority captured at registration time.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Registration order, used to break priority ties.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The extension itself.
    pub fn extension(&self) -> &Arc<dyn Extension> {
        &self.extension
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Entries {
    by_name: HashMap<Arc<str>, Registration>,
    next_sequence: u64,
}

/// Named extensions, unique by name, ordered by `(priority, registration order)`.
///
/// All methods take `&self`; the registry is meant to be shared behind an
/// `Arc` and may be mutated from any thread.
pub struct ExtensionRegistry {
    entries: RwLock<Entries>,
    sorted: RwLock<Arc<[Registration]>>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.list_names())
            .finish()
    }
}

impl ExtensionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            sorted: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Register a shared extension.
    ///
    /// Fails without touching the existing registration if the name is taken.
    pub fn register(&self, extension: Arc<dyn Extension>) -> Result<(), RegistryError> {
        let name: Arc<str> = Arc::from(extension.name());
        let mut entries = self.write_entries();

        if entries.by_name.contains_key(&name) {
            tracing::warn!(extension = %name, "duplicate extension name rejected");
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        let priority = extension.priority();
        let sequence = entries.next_sequence;
        entries.next_sequence += 1;
        entries.by_name.insert(
            name.clone(),
            Registration {
                name: name.clone(),
                priority,
                sequence,
                extension,
            },
        );
        self.publish(&entries);

        tracing::info!(extension = %name, priority, "extension registered");
        Ok(())
    }

    /// Register an owned extension.
    pub fn register_extension<E: Extension>(&self, extension: E) -> Result<(), RegistryError> {
        self.register(Arc::new(extension))
    }

    /// Remove an extension by name, returning it.
    pub fn unregister(&self, name: &str) -> Result<Arc<dyn Extension>, RegistryError> {
        let mut entries = self.write_entries();
        let removed = entries
            .by_name
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        self.publish(&entries);

        tracing::info!(extension = %name, "extension unregistered");
        Ok(removed.extension)
    }

    /// Look up an extension by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(name)
            .map(|r| r.extension.clone())
    }

    /// Whether an extension with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .contains_key(name)
    }

    /// All registrations in dispatch order (an owned copy).
    pub fn list_all(&self) -> Vec<Registration> {
        self.snapshot().to_vec()
    }

    /// All extension names in dispatch order.
    pub fn list_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|r| r.name().to_string()).collect()
    }

    /// The current sorted view. Cheap: clones one `Arc`.
    pub fn snapshot(&self) -> Arc<[Registration]> {
        self.sorted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Remove every registration, returning them in dispatch order.
    pub fn drain(&self) -> Vec<Registration> {
        let mut entries = self.write_entries();
        let drained = self.snapshot().to_vec();
        entries.by_name.clear();
        self.publish(&entries);

        tracing::info!(count = drained.len(), "extension registry drained");
        drained
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Called with the entries write lock held, so rebuilds are serialized
    // and the published view always matches the map.
    fn publish(&self, entries: &Entries) {
        let mut view: Vec<Registration> = entries.by_name.values().cloned().collect();
        view.sort_by_key(|r| (r.priority, r.sequence));
        *self.sorted.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_core::async_trait;

    struct Named(&'static str, i32);

    #[async_trait]
    impl Extension for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }
    }

    #[test]
    fn test_sorted_by_priority() {
        let registry = ExtensionRegistry::new();
        registry.register_extension(Named("thirty", 30)).unwrap();
        registry.register_extension(Named("ten", 10)).unwrap();
        registry.register_extension(Named("twenty", 20)).unwrap();

        assert_eq!(registry.list_names(), vec!["ten", "twenty", "thirty"]);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let registry = ExtensionRegistry::new();
        registry.register_extension(Named("b", 5)).unwrap();
        registry.register_extension(Named("a", 5)).unwrap();
        registry.register_extension(Named("first", -1)).unwrap();
        registry.register_extension(Named("c", 5)).unwrap();

        assert_eq!(registry.list_names(), vec!["first", "b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_name_keeps_original() {
        let registry = ExtensionRegistry::new();
        registry.register_extension(Named("dup", 1)).unwrap();
        let before = registry.list_all();

        let err = registry.register_extension(Named("dup", -100)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("dup".into()));

        let after = registry.list_all();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].priority(), 1);
        assert_eq!(after[0].sequence(), before[0].sequence());
    }

    #[test]
    fn test_unregister_missing() {
        let registry = ExtensionRegistry::new();
        assert_eq!(
            registry.unregister("nope").err(),
            Some(RegistryError::NotFound("nope".into()))
        );
    }

    #[test]
    fn test_unregister_rebuilds_view() {
        let registry = ExtensionRegistry::new();
        registry.register_extension(Named("a", 1)).unwrap();
        registry.register_extension(Named("b", 2)).unwrap();

        let removed = registry.unregister("a").unwrap();
        assert_eq!(removed.name(), "a");
        assert_eq!(registry.list_names(), vec!["b"]);
        assert!(registry.get("a").is_none());
        assert!(registry.contains("b"));
    }

    #[test]
    fn test_reregister_after_unregister_goes_last_among_ties() {
        let registry = ExtensionRegistry::new();
        registry.register_extension(Named("a", 0)).unwrap();
        registry.register_extension(Named("b", 0)).unwrap();
        registry.unregister("a").unwrap();
        registry.register_extension(Named("a", 0)).unwrap();

        assert_eq!(registry.list_names(), vec!["b", "a"]);
    }

    #[test]
    fn test_snapshots_are_detached() {
        let registry = ExtensionRegistry::new();
        registry.register_extension(Named("a", 0)).unwrap();

        let held = registry.snapshot();
        let mut listed = registry.list_names();
        listed.push("intruder".into());
        registry.register_extension(Named("b", 0)).unwrap();

        assert_eq!(held.len(), 1);
        assert_eq!(registry.list_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_drain_empties_registry() {
        let registry = ExtensionRegistry::new();
        registry.register_extension(Named("b", 2)).unwrap();
        registry.register_extension(Named("a", 1)).unwrap();

        let drained: Vec<_> = registry.drain().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(ExtensionRegistry::new());
        let names: Vec<&'static str> = vec!["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"];

        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let registry = registry.clone();
                let name = *name;
                std::thread::spawn(move || registry.register_extension(Named(name, 0)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(registry.len(), names.len());
        let sequences: Vec<u64> = registry.list_all().iter().map(|r| r.sequence()).collect();
        let mut sorted = sequences.clone();
        sorted.sort_unstable();
        assert_eq!(sequences, sorted);
    }
}
