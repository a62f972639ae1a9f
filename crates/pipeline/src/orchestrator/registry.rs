use crate::adapters::ToolAdapter;
use crate::core::ToolKind;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ToolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry preloaded with the five built-in adapters.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for adapter in crate::adapters::builtin_adapters() {
            registry.register_arc(adapter);
        }
        registry
    }

    pub fn register<A: ToolAdapter + 'static>(&mut self, adapter: A) {
        self.register_arc(Arc::new(adapter));
    }

    pub fn register_arc(&mut self, adapter: Arc<dyn ToolAdapter>) {
        let id = adapter.id().to_string();
        self.adapters.insert(id, adapter);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ToolAdapter>> {
        self.adapters.get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn ToolAdapter>> {
        let mut adapters: Vec<_> = self.adapters.values().cloned().collect();
        adapters.sort_by_key(|a| a.name().to_string());
        adapters
    }

    /// Adapters whose kind is in the enabled set.
    pub fn for_kinds(&self, kinds: &BTreeSet<ToolKind>) -> Vec<Arc<dyn ToolAdapter>> {
        self.all()
            .into_iter()
            .filter(|adapter| kinds.contains(&adapter.kind()))
            .collect()
    }

    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_covers_all_kinds() {
        let registry = AdapterRegistry::with_builtin();
        let kinds: BTreeSet<ToolKind> = ToolKind::all().into_iter().collect();
        assert_eq!(registry.for_kinds(&kinds).len(), 5);
    }

    #[test]
    fn test_for_kinds_filters() {
        let registry = AdapterRegistry::with_builtin();
        let kinds: BTreeSet<ToolKind> = [ToolKind::Sast, ToolKind::Secret].into_iter().collect();
        let selected = registry.for_kinds(&kinds);
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|a| kinds.contains(&a.kind())));
    }
}
