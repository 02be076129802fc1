use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies a dependency by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyKey {
    id: TypeId,
    name: &'static str,
}

impl DependencyKey {
    /// Works for trait objects too, e.g. `DependencyKey::of::<dyn Clock>()`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.name
    }
}

struct Entry {
    name: &'static str,
    // Always holds an `Arc<T>` for the `T` the entry is keyed by.
    value: Box<dyn Any + Send + Sync>,
}

/// Typed values actions may ask for, filled once at startup and read-only
/// afterwards.
#[derive(Default)]
pub struct DependencyRegistry {
    entries: HashMap<TypeId, Entry>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under type `T`, replacing any previous value.
    pub fn insert<T>(&mut self, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = DependencyKey::of::<T>();
        let previous = self.entries.insert(
            key.id,
            Entry {
                name: key.name,
                value: Box::new(value),
            },
        );
        if previous.is_some() {
            tracing::warn!(type_name = key.name, "dependency registered twice; keeping the latest");
        }
    }

    pub fn with<T>(mut self, value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.insert(value);
        self
    }

    pub fn get<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|e| e.value.downcast_ref::<Arc<T>>())
            .cloned()
    }

    pub fn contains(&self, key: &DependencyKey) -> bool {
        self.entries.contains_key(&key.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.name).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
