//! Registry-facing boundary of the form tool's subsystems.
//!
//! Each subsystem's internals (search UI, form binding, CSV templates, translation
//! tables, debug rendering) live outside this binary; here they are only a named
//! handle with a start hook.

use anyhow::Result;
use modreg::{ModuleDescriptor, ModuleRegistry};
use runtime::AppConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle registered as a module's instance.
#[derive(Debug)]
pub struct Subsystem {
    name: &'static str,
    ready: AtomicBool,
}

impl Subsystem {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            ready: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn start(&self) -> Result<()> {
        tracing::debug!(subsystem = self.name, "subsystem starting");
        self.ready.store(true, Ordering::Release);
        Ok(())
    }
}

/// Built-in subsystems: (name, description, dependencies).
pub const BUILTIN: &[(&str, &str, &[&str])] = &[
    ("printer_database", "Printer model catalog", &[]),
    ("translations", "UI translation tables", &[]),
    ("templates", "CSV/JSON contract templates", &["printer_database"]),
    ("form_manager", "Contract form binding and serialization", &["translations"]),
    (
        "autocomplete",
        "Printer model search and suggestions",
        &["printer_database", "form_manager"],
    ),
    ("debug_panel", "Health and diagnostics overlay", &[]),
];

/// Register every enabled built-in subsystem, applying configured manifests.
///
/// Returns the names that were registered.
pub fn register_builtin(registry: &ModuleRegistry, config: &AppConfig) -> Vec<&'static str> {
    let mut registered = Vec::new();
    for &(name, description, deps) in BUILTIN {
        let manifest = config.manifest_for(name);
        if !manifest.enabled {
            tracing::info!(module = name, "Module disabled by configuration");
            continue;
        }

        let instance = Subsystem::new(name);
        let hook_target = instance.clone();
        let descriptor = ModuleDescriptor::new()
            .with_description(description)
            .depends_on(deps.iter().copied())
            .with_instance(instance)
            .on_start(move || {
                let subsystem = hook_target.clone();
                async move { subsystem.start().await }
            })
            .apply_manifest(&manifest);

        if registry.register(name, descriptor) {
            registered.push(name);
        }
    }

    for name in config.modules.keys() {
        if !BUILTIN.iter().any(|(n, _, _)| *n == name.as_str()) {
            tracing::warn!(module = %name, "Manifest for unknown module ignored");
        }
    }
    registered
}
