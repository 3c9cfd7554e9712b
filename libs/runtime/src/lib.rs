//! Process-level plumbing shared by Lease Desk binaries: layered configuration,
//! logging initialization and recent-log capture.

pub mod capture;
pub mod config;
pub mod logging;
pub mod paths;

pub use capture::{LogBuffer, LogRecord};
pub use config::{AppConfig, AppSection, CliArgs, DiagnosticsConfig, LoggingConfig, Section};
