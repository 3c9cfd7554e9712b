use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

use crate::contracts::Instance;
use crate::descriptor::ModuleDescriptor;
use crate::error::{RegistrationError, RegistryError};
use crate::lifecycle::ModuleState;
use crate::store::ModuleStore;

/// In-process startup coordinator for independently implemented subsystems.
///
/// Construct one per application run and share it behind an `Arc`. Registration
/// happens at bootstrap; [`start_all`](Self::start_all) then brings modules up
/// one at a time in dependency order.
///
/// Concurrency notes:
/// - The store sits behind a `parking_lot::RwLock` that is never held across an `.await`.
/// - Start-up is serialized by an async mutex, so no two start hooks overlap.
/// - A start hook must not call back into `start_one`/`start_all` (it would wait on itself).
pub struct ModuleRegistry {
    pub(crate) store: RwLock<ModuleStore>,
    pub(crate) driver: tokio::sync::Mutex<()>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.read();
        let names: Vec<&str> = store.modules.keys().map(String::as_str).collect();
        f.debug_struct("ModuleRegistry")
            .field("modules", &names)
            .field("init_order", &store.init_order)
            .finish()
    }
}

/// Point-in-time view of one registered module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub state: ModuleState,
    pub error_count: u64,
    pub last_error: Option<String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(ModuleStore::default()),
            driver: tokio::sync::Mutex::new(()),
        }
    }

    /// Store or replace the descriptor for `name`.
    ///
    /// Never fails the caller's flow: a malformed descriptor is logged and reported as `false`.
    pub fn register(&self, name: impl Into<String>, descriptor: ModuleDescriptor) -> bool {
        let name = name.into();
        match self.try_register(name.clone(), descriptor) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(module = %name, error = %err, "Failed to register module");
                false
            }
        }
    }

    /// Typed form of [`register`](Self::register).
    pub fn try_register(
        &self,
        name: impl Into<String>,
        mut descriptor: ModuleDescriptor,
    ) -> Result<(), RegistrationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistrationError::EmptyName);
        }

        // Dependencies are an ordered set: keep the first occurrence of each name.
        let mut deps: Vec<String> = Vec::with_capacity(descriptor.dependencies.len());
        for dep in descriptor.dependencies.drain(..) {
            if dep.trim().is_empty() {
                return Err(RegistrationError::EmptyDependency { module: name });
            }
            if dep == name {
                return Err(RegistrationError::SelfDependency { module: name });
            }
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        descriptor.dependencies = deps;

        let replaced = self.store.write().insert(name.clone(), descriptor);
        if replaced {
            tracing::warn!(module = %name, "Module re-registered; previous descriptor replaced");
        } else {
            tracing::info!(module = %name, "Registered module");
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.store.read().get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.store.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self, name: &str) -> Option<ModuleState> {
        self.store.read().get(name).map(|e| e.state)
    }

    /// All modules in registration order.
    pub fn modules(&self) -> Vec<ModuleInfo> {
        let store = self.store.read();
        store
            .modules
            .iter()
            .map(|(name, e)| ModuleInfo {
                name: name.clone(),
                version: e.descriptor.version.clone(),
                description: e.descriptor.description.clone(),
                dependencies: e.descriptor.dependencies.clone(),
                state: e.state,
                error_count: e.error_count,
                last_error: e.last_error.clone(),
            })
            .collect()
    }

    /// Names in the order they finished initialization.
    pub fn init_order(&self) -> Vec<String> {
        self.store.read().init_order.clone()
    }

    /// Compute the initialization order without touching any state.
    pub fn resolve(&self) -> Result<Vec<String>, RegistryError> {
        self.store.read().resolve()
    }

    /// Instance of an `Initialized` module.
    ///
    /// `None` means "feature unavailable": the module is unknown, not started yet,
    /// or was registered without an instance.
    pub fn get_module(&self, name: &str) -> Option<Instance> {
        let store = self.store.read();
        let Some(entry) = store.get(name) else {
            tracing::warn!(module = %name, "Module not found");
            return None;
        };
        if !entry.is_initialized() {
            tracing::warn!(module = %name, "Module not yet initialized");
            return None;
        }
        if entry.descriptor.instance.is_none() {
            tracing::debug!(module = %name, "Module has no instance handle");
        }
        entry.descriptor.instance.clone()
    }

    /// Typed variant of [`get_module`](Self::get_module).
    pub fn get_module_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.get_module(name)?.downcast::<T>() {
            Ok(instance) => Some(instance),
            Err(_) => {
                tracing::warn!(
                    module = %name,
                    expected = std::any::type_name::<T>(),
                    "Module instance has a different type"
                );
                None
            }
        }
    }

    /// Drop every module, the init order and the error tally.
    pub fn reset(&self) {
        self.store.write().clear();
        tracing::debug!("Module registry reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Catalog {
        size: usize,
    }

    #[test]
    fn register_rejects_malformed_descriptors() {
        let reg = ModuleRegistry::new();
        assert!(!reg.register("  ", ModuleDescriptor::new()));
        assert!(!reg.register("a", ModuleDescriptor::new().depends_on([""])));
        assert!(!reg.register("a", ModuleDescriptor::new().depends_on(["a"])));
        assert!(reg.is_empty());

        assert_eq!(
            reg.try_register("a", ModuleDescriptor::new().depends_on(["a"])),
            Err(RegistrationError::SelfDependency { module: "a".into() })
        );
    }

    #[test]
    fn duplicate_dependencies_collapse_in_declaration_order() {
        let reg = ModuleRegistry::new();
        assert!(reg.register("ui", ModuleDescriptor::new().depends_on(["b", "a", "b"])));
        assert_eq!(reg.modules()[0].dependencies, vec!["b", "a"]);
    }

    #[test]
    fn last_registration_wins() {
        let reg = ModuleRegistry::new();
        assert!(reg.register("a", ModuleDescriptor::new().with_version("1.0.0")));
        assert!(reg.register("b", ModuleDescriptor::new()));
        assert!(reg.register("a", ModuleDescriptor::new().with_version("2.0.0")));

        let mods = reg.modules();
        assert_eq!(mods.len(), 2);
        assert_eq!(mods[0].name, "a");
        assert_eq!(mods[0].version, "2.0.0");
    }

    #[test]
    fn unknown_dependencies_are_accepted_at_registration() {
        let reg = ModuleRegistry::new();
        assert!(reg.register("x", ModuleDescriptor::new().depends_on(["y"])));
        assert_eq!(reg.state("x"), Some(ModuleState::Registered));
    }

    #[test]
    fn resolve_is_repeatable_on_a_valid_graph() {
        let reg = ModuleRegistry::new();
        reg.register("forms", ModuleDescriptor::new().depends_on(["i18n"]));
        reg.register("i18n", ModuleDescriptor::new());

        let first = reg.resolve().unwrap();
        let second = reg.resolve().unwrap();
        assert_eq!(first, vec!["i18n", "forms"]);
        assert_eq!(first, second);
        assert!(reg.init_order().is_empty());
    }

    #[test]
    fn resolve_failures_leave_no_trace() {
        let cyclic = ModuleRegistry::new();
        cyclic.register("p", ModuleDescriptor::new().depends_on(["q"]));
        cyclic.register("q", ModuleDescriptor::new().depends_on(["p"]));

        let dangling = ModuleRegistry::new();
        dangling.register("x", ModuleDescriptor::new().depends_on(["y"]));

        for reg in [&cyclic, &dangling] {
            assert!(reg.resolve().is_err());
            assert!(reg.resolve().is_err());

            assert_eq!(reg.health_report().total_errors, 0);
            assert!(reg.init_order().is_empty());
            for m in reg.modules() {
                assert_eq!(m.state, ModuleState::Registered);
                assert_eq!(m.error_count, 0);
                assert!(m.last_error.is_none());
            }
        }
    }

    #[test]
    fn get_module_requires_initialized_state() {
        let reg = ModuleRegistry::new();
        let catalog = Arc::new(Catalog { size: 3 });
        reg.register("catalog", ModuleDescriptor::new().with_instance(catalog));

        assert!(reg.get_module("catalog").is_none());
        assert!(reg.get_module("missing").is_none());
    }

    #[tokio::test]
    async fn get_module_as_downcasts_after_start() {
        let reg = ModuleRegistry::new();
        reg.register(
            "catalog",
            ModuleDescriptor::new().with_instance(Arc::new(Catalog { size: 3 })),
        );
        reg.start_one("catalog").await.unwrap();

        let catalog = reg.get_module_as::<Catalog>("catalog").unwrap();
        assert_eq!(catalog.size, 3);
        assert!(reg.get_module_as::<String>("catalog").is_none());
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let reg = ModuleRegistry::new();
        reg.register("a", ModuleDescriptor::new());
        reg.start_all().await.unwrap();
        reg.record_error("a", "late failure");

        reg.reset();

        assert!(reg.is_empty());
        assert!(reg.init_order().is_empty());
        assert_eq!(reg.health_report().total_errors, 0);
    }
}
