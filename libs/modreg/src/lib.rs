//! # modreg - Module Lifecycle Registry
//!
//! Registers independently implemented subsystems, resolves their declared
//! dependency graph, starts them one at a time in a safe order, and tracks
//! per-module health for operational visibility.
//!
//! ## Layers
//!
//! - **Store**: descriptors keyed by name, in registration order
//! - **Resolver**: depth-first topological sort with cycle and missing-reference detection
//! - **Driver**: sequential, fail-fast start-up (`start_all` / `start_one`)
//! - **Reporter**: health reports, reverse-dependency queries, diagnostics export
//!
//! ## Example
//!
//! ```rust,ignore
//! use modreg::{ModuleDescriptor, ModuleRegistry};
//!
//! let registry = ModuleRegistry::new();
//! registry.register("printer_database", ModuleDescriptor::new());
//! registry.register(
//!     "autocomplete",
//!     ModuleDescriptor::new()
//!         .depends_on(["printer_database"])
//!         .on_start(|| async { Ok(()) }),
//! );
//! registry.start_all().await?;
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

pub mod contracts;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod registry;
pub mod resolver;
pub mod runtime;

mod store;

pub use contracts::{hook_fn, FnHook, Instance, StartHook};
pub use descriptor::{ModuleDescriptor, ModuleManifest};
pub use diagnostics::Diagnostics;
pub use error::{RegistrationError, RegistryError};
pub use health::{HealthReport, ModuleHealth};
pub use lifecycle::ModuleState;
pub use registry::{ModuleInfo, ModuleRegistry};
pub use runtime::{run, RunOptions, ShutdownOptions};
