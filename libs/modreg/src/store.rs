//! Module Store: registered descriptors, lifecycle state and the error tally.

use indexmap::IndexMap;

use crate::descriptor::ModuleDescriptor;
use crate::error::RegistryError;
use crate::lifecycle::ModuleState;
use crate::resolver;

pub(crate) struct ModuleEntry {
    pub(crate) descriptor: ModuleDescriptor,
    pub(crate) state: ModuleState,
    pub(crate) last_error: Option<String>,
    pub(crate) error_count: u64,
    /// Bumped on every (re-)registration so a stale start cannot flip a newer descriptor.
    pub(crate) generation: u64,
}

impl ModuleEntry {
    pub(crate) fn is_initialized(&self) -> bool {
        self.state == ModuleState::Initialized
    }
}

/// Plain data; every method is synchronous and side-effect free except the mutators.
#[derive(Default)]
pub(crate) struct ModuleStore {
    /// Registration order; overwriting a name keeps its original slot.
    pub(crate) modules: IndexMap<String, ModuleEntry>,
    /// Names in the order they reached `Initialized`.
    pub(crate) init_order: Vec<String>,
    /// Running error count per name, kept across descriptor overwrites.
    pub(crate) error_tally: IndexMap<String, u64>,
    next_generation: u64,
}

impl ModuleStore {
    /// Store or replace a descriptor. Returns `true` when an existing entry was replaced.
    pub(crate) fn insert(&mut self, name: String, descriptor: ModuleDescriptor) -> bool {
        self.next_generation += 1;
        let entry = ModuleEntry {
            descriptor,
            state: ModuleState::Registered,
            last_error: None,
            error_count: 0,
            generation: self.next_generation,
        };
        let replaced = self.modules.insert(name.clone(), entry).is_some();
        if replaced {
            self.init_order.retain(|n| n != &name);
        }
        replaced
    }

    pub(crate) fn get(&self, name: &str) -> Option<&ModuleEntry> {
        self.modules.get(name)
    }

    pub(crate) fn is_initialized(&self, name: &str) -> bool {
        self.modules.get(name).is_some_and(ModuleEntry::is_initialized)
    }

    /// Flip `name` to `Initialized` if it still carries `generation`.
    pub(crate) fn mark_initialized(&mut self, name: &str, generation: u64) -> bool {
        match self.modules.get_mut(name) {
            Some(entry) if entry.generation == generation && !entry.is_initialized() => {
                entry.state = ModuleState::Initialized;
                self.init_order.push(name.to_string());
                true
            }
            _ => false,
        }
    }

    /// Record one error; returns the running tally for `name`.
    pub(crate) fn record_error(&mut self, name: &str, message: String) -> u64 {
        if let Some(entry) = self.modules.get_mut(name) {
            entry.last_error = Some(message);
            entry.error_count += 1;
        }
        let tally = self.error_tally.entry(name.to_string()).or_insert(0);
        *tally += 1;
        *tally
    }

    pub(crate) fn resolve(&self) -> Result<Vec<String>, RegistryError> {
        resolver::resolve(self.modules.keys().map(String::as_str), |name| {
            self.modules
                .get(name)
                .map(|e| e.descriptor.dependencies.as_slice())
        })
    }

    pub(crate) fn dependency_graph(&self) -> IndexMap<String, Vec<String>> {
        self.modules
            .iter()
            .map(|(name, e)| (name.clone(), e.descriptor.dependencies.clone()))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.modules.clear();
        self.init_order.clear();
        self.error_tally.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_keeps_slot_and_resets_state() {
        let mut store = ModuleStore::default();
        store.insert("a".into(), ModuleDescriptor::new());
        store.insert("b".into(), ModuleDescriptor::new());
        let generation = store.get("a").unwrap().generation;
        assert!(store.mark_initialized("a", generation));
        store.record_error("a", "boom".into());

        assert!(store.insert("a".into(), ModuleDescriptor::new().with_version("2.0.0")));

        let names: Vec<_> = store.modules.keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
        let a = store.get("a").unwrap();
        assert_eq!(a.state, ModuleState::Registered);
        assert_eq!(a.error_count, 0);
        assert!(a.last_error.is_none());
        assert!(store.init_order.is_empty());
        // The historical tally survives the overwrite.
        assert_eq!(store.error_tally["a"], 1);
    }

    #[test]
    fn stale_generation_does_not_initialize() {
        let mut store = ModuleStore::default();
        store.insert("a".into(), ModuleDescriptor::new());
        let stale = store.get("a").unwrap().generation;
        store.insert("a".into(), ModuleDescriptor::new());

        assert!(!store.mark_initialized("a", stale));
        assert!(!store.is_initialized("a"));
    }

    #[test]
    fn record_error_for_unknown_name_only_touches_tally() {
        let mut store = ModuleStore::default();
        assert_eq!(store.record_error("ghost", "lost".into()), 1);
        assert_eq!(store.record_error("ghost", "lost again".into()), 2);
        assert!(store.get("ghost").is_none());
    }
}
