//! Health & error reporting over the module store.

use serde::{Deserialize, Serialize};

use crate::lifecycle::ModuleState;
use crate::registry::ModuleRegistry;
use crate::store::ModuleStore;

/// Aggregated snapshot of module counts and error totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub total_modules: usize,
    pub initialized_modules: usize,
    pub modules_with_errors: usize,
    /// Every error ever recorded, including names whose descriptor was since replaced.
    pub total_errors: u64,
    pub modules: Vec<ModuleHealth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleHealth {
    pub name: String,
    pub state: ModuleState,
    pub error_count: u64,
    pub last_error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.initialized_modules == self.total_modules && self.modules_with_errors == 0
    }
}

impl ModuleStore {
    pub(crate) fn health_report(&self) -> HealthReport {
        let modules: Vec<ModuleHealth> = self
            .modules
            .iter()
            .map(|(name, e)| ModuleHealth {
                name: name.clone(),
                state: e.state,
                error_count: e.error_count,
                last_error: e.last_error.clone(),
            })
            .collect();

        HealthReport {
            total_modules: modules.len(),
            initialized_modules: modules
                .iter()
                .filter(|m| m.state == ModuleState::Initialized)
                .count(),
            modules_with_errors: modules.iter().filter(|m| m.error_count > 0).count(),
            total_errors: self.error_tally.values().sum(),
            modules,
        }
    }
}

impl ModuleRegistry {
    /// Record an error against `name`. Never fails; unknown names only feed the tally.
    pub fn record_error(&self, name: &str, error: impl std::fmt::Display) {
        let message = error.to_string();
        let tally = self.store.write().record_error(name, message.clone());
        tracing::error!(module = %name, error = %message, error_count = tally, "Error in module");
    }

    pub fn health_report(&self) -> HealthReport {
        let report = self.store.read().health_report();
        tracing::debug!(
            total = report.total_modules,
            initialized = report.initialized_modules,
            with_errors = report.modules_with_errors,
            errors = report.total_errors,
            "Health report generated"
        );
        report
    }

    /// Registered modules that list `name` among their dependencies, in registration order.
    pub fn find_dependents(&self, name: &str) -> Vec<String> {
        self.store
            .read()
            .modules
            .iter()
            .filter(|(_, e)| e.descriptor.dependencies.iter().any(|d| d == name))
            .map(|(n, _)| n.clone())
            .collect()
    }
}
