use thiserror::Error;

/// Reasons a descriptor is refused at registration time.
///
/// Never escapes [`ModuleRegistry::register`](crate::ModuleRegistry::register),
/// which reports it as `false`; use `try_register` to inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("module name must not be empty")]
    EmptyName,
    #[error("module '{module}' declares an empty dependency name")]
    EmptyDependency { module: String },
    #[error("module '{module}' cannot depend on itself")]
    SelfDependency { module: String },
}

/// Structured errors for resolution and start-up.
///
/// Every variant names the module the failure is attributed to.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("module '{0}' not found")]
    ModuleNotFound(String),
    #[error("missing dependency '{dependency}' for module '{module}'")]
    MissingDependency { module: String, dependency: String },
    #[error("circular dependency detected involving '{module}': {}", path.join(" -> "))]
    CircularDependency { module: String, path: Vec<String> },
    #[error("dependency '{dependency}' not initialized for module '{module}'")]
    DependencyNotReady { module: String, dependency: String },
    #[error("failed to initialize module '{module}'")]
    HookFailure {
        module: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RegistryError {
    /// Name of the module the error is recorded against.
    pub fn module(&self) -> &str {
        match self {
            RegistryError::ModuleNotFound(module)
            | RegistryError::MissingDependency { module, .. }
            | RegistryError::CircularDependency { module, .. }
            | RegistryError::DependencyNotReady { module, .. }
            | RegistryError::HookFailure { module, .. } => module,
        }
    }

    /// Message stored as the module's `last_error`.
    pub(crate) fn detail(&self) -> String {
        match self {
            RegistryError::HookFailure { source, .. } => format!("{source:#}"),
            other => other.to_string(),
        }
    }
}
