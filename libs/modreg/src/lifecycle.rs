//! Lifecycle Driver: brings modules up strictly one at a time in resolved order.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::contracts::StartHook;
use crate::error::RegistryError;
use crate::registry::ModuleRegistry;

/// Per-module lifecycle tag.
///
/// `Registered --(start succeeds)--> Initialized`. A failed start leaves the module
/// `Registered`; `Initialized` is terminal for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Registered,
    Initialized,
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ModuleState::Registered => "registered",
            ModuleState::Initialized => "initialized",
        })
    }
}

/// What `start_locked` found before running anything.
enum Plan {
    AlreadyInitialized,
    Run {
        hook: Option<Arc<dyn StartHook>>,
        generation: u64,
    },
}

impl ModuleRegistry {
    /// Resolve the dependency order and start every module in it.
    ///
    /// Fail-fast: the first error aborts the remaining sequence. Modules started
    /// before the failure stay `Initialized`; nothing is rolled back or retried.
    pub async fn start_all(&self) -> Result<(), RegistryError> {
        let _turn = self.driver.lock().await;

        let order = match self.resolve() {
            Ok(order) => order,
            Err(err) => {
                tracing::error!(error = %err, "Failed to resolve module dependency order");
                self.record_failure(&err);
                return Err(err);
            }
        };
        tracing::info!(order = ?order, "Initializing modules in dependency order");

        for name in &order {
            self.start_locked(name).await?;
        }

        tracing::info!(count = order.len(), "All modules initialized");
        Ok(())
    }

    /// Start a single module whose dependencies are already `Initialized`.
    ///
    /// Idempotent: an `Initialized` module is left untouched and its hook is not re-run.
    pub async fn start_one(&self, name: &str) -> Result<(), RegistryError> {
        let _turn = self.driver.lock().await;
        self.start_locked(name).await
    }

    /// Caller must hold the driver lock.
    async fn start_locked(&self, name: &str) -> Result<(), RegistryError> {
        let plan = {
            let store = self.store.read();
            let entry = store
                .get(name)
                .ok_or_else(|| RegistryError::ModuleNotFound(name.to_string()))?;

            if entry.is_initialized() {
                Ok(Plan::AlreadyInitialized)
            } else {
                match entry
                    .descriptor
                    .dependencies
                    .iter()
                    .find(|dep| !store.is_initialized(dep))
                {
                    Some(dep) => Err(RegistryError::DependencyNotReady {
                        module: name.to_string(),
                        dependency: dep.clone(),
                    }),
                    None => Ok(Plan::Run {
                        hook: entry.descriptor.start_hook.clone(),
                        generation: entry.generation,
                    }),
                }
            }
        };

        let (hook, generation) = match plan {
            Ok(Plan::AlreadyInitialized) => {
                tracing::debug!(module = %name, "Module already initialized");
                return Ok(());
            }
            Ok(Plan::Run { hook, generation }) => (hook, generation),
            Err(err) => {
                self.record_failure(&err);
                return Err(err);
            }
        };

        if let Some(hook) = hook {
            tracing::debug!(module = %name, "Running start hook");
            if let Err(source) = run_hook(hook.as_ref()).await {
                let err = RegistryError::HookFailure {
                    module: name.to_string(),
                    source,
                };
                self.record_failure(&err);
                return Err(err);
            }
        }

        if self.store.write().mark_initialized(name, generation) {
            tracing::info!(module = %name, "Module initialized successfully");
        } else {
            tracing::warn!(
                module = %name,
                "Module was re-registered while starting; new descriptor left registered"
            );
        }
        Ok(())
    }

    fn record_failure(&self, err: &RegistryError) {
        self.record_error(err.module(), err.detail());
    }
}

/// Await the hook to completion; a panic inside it is reported as an ordinary failure.
async fn run_hook(hook: &dyn StartHook) -> anyhow::Result<()> {
    match AssertUnwindSafe(hook.start()).catch_unwind().await {
        Ok(result) => result,
        Err(panic_err) => {
            let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                (*msg).to_string()
            } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(anyhow::anyhow!("start hook panicked: {info}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ModuleDescriptor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> ModuleDescriptor {
        let counter = counter.clone();
        ModuleDescriptor::new().on_start(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn start_one_is_idempotent() {
        let reg = ModuleRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        reg.register("a", counting(&calls));

        reg.start_one("a").await.unwrap();
        reg.start_one("a").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(reg.state("a"), Some(ModuleState::Initialized));
        assert_eq!(reg.init_order(), vec!["a"]);
    }

    #[tokio::test]
    async fn start_one_unknown_module() {
        let reg = ModuleRegistry::new();
        let err = reg.start_one("nope").await.unwrap_err();
        assert!(matches!(err, RegistryError::ModuleNotFound(ref n) if n == "nope"));
        assert_eq!(reg.health_report().total_errors, 0);
    }

    #[tokio::test]
    async fn start_one_refuses_when_dependency_not_ready() {
        let reg = ModuleRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        reg.register("base", ModuleDescriptor::new());
        reg.register("top", counting(&calls).depends_on(["base"]));

        let err = reg.start_one("top").await.unwrap_err();
        match err {
            RegistryError::DependencyNotReady { module, dependency } => {
                assert_eq!(module, "top");
                assert_eq!(dependency, "base");
            }
            other => panic!("expected DependencyNotReady, got: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(reg.state("top"), Some(ModuleState::Registered));
        assert_eq!(reg.modules()[1].error_count, 1);

        // Once the dependency is up, a retry by the caller succeeds.
        reg.start_one("base").await.unwrap();
        reg.start_one("top").await.unwrap();
        assert_eq!(reg.init_order(), vec!["base", "top"]);
    }

    #[tokio::test]
    async fn failed_hook_can_be_retried_by_caller() {
        let reg = ModuleRegistry::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        reg.register(
            "flaky",
            ModuleDescriptor::new().on_start(move || {
                let n = a.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        anyhow::bail!("transient");
                    }
                    Ok(())
                }
            }),
        );

        assert!(reg.start_one("flaky").await.is_err());
        assert_eq!(reg.state("flaky"), Some(ModuleState::Registered));
        reg.start_one("flaky").await.unwrap();
        assert_eq!(reg.state("flaky"), Some(ModuleState::Initialized));

        let info = &reg.modules()[0];
        assert_eq!(info.error_count, 1);
        assert_eq!(info.last_error.as_deref(), Some("transient"));
    }

    struct Corrupt;

    #[async_trait::async_trait]
    impl StartHook for Corrupt {
        async fn start(&self) -> anyhow::Result<()> {
            panic!("template file corrupt");
        }
    }

    #[tokio::test]
    async fn panicking_hook_becomes_hook_failure() {
        let reg = ModuleRegistry::new();
        reg.register(
            "bad",
            ModuleDescriptor::new().with_start_hook(Arc::new(Corrupt)),
        );

        let err = reg.start_all().await.unwrap_err();
        assert!(matches!(err, RegistryError::HookFailure { ref module, .. } if module == "bad"));
        let last = reg.modules()[0].last_error.clone().unwrap();
        assert!(last.contains("template file corrupt"), "got: {last}");
    }

    #[test]
    fn state_display_and_serde_agree() {
        assert_eq!(ModuleState::Initialized.to_string(), "initialized");
        assert_eq!(
            serde_json::to_string(&ModuleState::Registered).unwrap(),
            "\"registered\""
        );
    }
}
