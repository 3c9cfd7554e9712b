use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::health::HealthReport;
use crate::registry::ModuleRegistry;

/// Serializable snapshot handed to external diagnostics surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub timestamp: DateTime<Utc>,
    /// Realized order: names that actually reached `Initialized`.
    pub init_order: Vec<String>,
    /// Order the resolver would produce now; absent when the graph does not resolve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_error: Option<String>,
    pub health_report: HealthReport,
    pub dependency_graph: IndexMap<String, Vec<String>>,
    pub error_summary: IndexMap<String, u64>,
}

impl Diagnostics {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl ModuleRegistry {
    /// Take a consistent snapshot of order, health, graph and error tally.
    pub fn export_diagnostics(&self) -> Diagnostics {
        let store = self.store.read();
        let (resolved_order, resolution_error) = match store.resolve() {
            Ok(order) => (Some(order), None),
            Err(err) => (None, Some(err.to_string())),
        };

        Diagnostics {
            timestamp: Utc::now(),
            init_order: store.init_order.clone(),
            resolved_order,
            resolution_error,
            health_report: store.health_report(),
            dependency_graph: store.dependency_graph(),
            error_summary: store.error_tally.clone(),
        }
    }
}
