use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

use crate::contracts::{hook_fn, Instance, StartHook};

pub(crate) const DEFAULT_VERSION: &str = "1.0.0";

/// Fixed description of a subsystem handed to the registry at bootstrap.
///
/// The structure is closed: everything the registry knows about a module lives
/// in these fields. Extra metadata belongs in the module's own instance.
#[derive(Clone)]
pub struct ModuleDescriptor {
    pub(crate) version: String,
    pub(crate) description: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) instance: Option<Instance>,
    pub(crate) start_hook: Option<Arc<dyn StartHook>>,
}

impl Default for ModuleDescriptor {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            description: String::new(),
            dependencies: Vec::new(),
            instance: None,
            start_hook: None,
        }
    }
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("dependencies", &self.dependencies)
            .field("has_instance", &self.instance.is_some())
            .field("has_start_hook", &self.start_hook.is_some())
            .finish()
    }
}

impl ModuleDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare the modules that must be `Initialized` before this one starts.
    /// Declaration order is kept; it drives the traversal order during resolution.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_instance<T: Any + Send + Sync>(mut self, instance: Arc<T>) -> Self {
        let instance: Instance = instance;
        self.instance = Some(instance);
        self
    }

    pub fn with_start_hook(mut self, hook: Arc<dyn StartHook>) -> Self {
        self.start_hook = Some(hook);
        self
    }

    /// Shorthand for `with_start_hook(hook_fn(f))`.
    pub fn on_start<F, Fut>(self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.with_start_hook(hook_fn(f))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn has_start_hook(&self) -> bool {
        self.start_hook.is_some()
    }

    /// Overlay the fields a manifest sets; unset fields keep their current value.
    pub fn apply_manifest(mut self, manifest: &ModuleManifest) -> Self {
        if let Some(version) = &manifest.version {
            self.version = version.clone();
        }
        if let Some(description) = &manifest.description {
            self.description = description.clone();
        }
        if let Some(deps) = &manifest.dependencies {
            self.dependencies = deps.clone();
        }
        self
    }
}

/// Configuration-side view of a module: metadata and dependency overrides.
///
/// Unknown keys are rejected when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Disabled modules are not registered at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replaces the built-in dependency list when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
}

fn default_enabled() -> bool {
    true
}

impl Default for ModuleManifest {
    fn default() -> Self {
        Self {
            enabled: true,
            version: None,
            description: None,
            dependencies: None,
        }
    }
}
