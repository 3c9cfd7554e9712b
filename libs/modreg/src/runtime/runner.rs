//! Registry runner.
//!
//! Drives one bootstrap: start every registered module in dependency order,
//! report health, then park until shutdown is requested. There is no teardown
//! phase; modules stay `Initialized` until the process exits.

use crate::registry::ModuleRegistry;
use crate::runtime::shutdown;
use std::{future::Future, pin::Pin, sync::Arc};
use tokio_util::sync::CancellationToken;

/// How the runner should decide when to stop.
pub enum ShutdownOptions {
    /// Listen for OS signals (Ctrl+C / SIGTERM).
    Signals,
    /// An external `CancellationToken` controls the lifetime.
    ///
    /// The runner only observes it; a failed start-up never cancels it.
    Token(CancellationToken),
    /// An arbitrary future; when it completes, we stop waiting.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

/// Options for running a populated registry.
pub struct RunOptions {
    /// Registry with every module already registered.
    pub registry: Arc<ModuleRegistry>,
    /// Shutdown strategy.
    pub shutdown: ShutdownOptions,
}

/// Full cycle: start → report → wait.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let cancel = match &opts.shutdown {
        ShutdownOptions::Token(t) => t.child_token(),
        _ => CancellationToken::new(),
    };

    match opts.shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                match shutdown::wait_for_shutdown().await {
                    Ok(()) => {
                        tracing::info!("shutdown: signal received");
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "shutdown: primary waiter failed; falling back to ctrl_c()"
                        );
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::info!("shutdown: external token will control lifetime");
        }
    }

    tracing::info!(modules = opts.registry.len(), "Phase: start");
    if let Err(err) = opts.registry.start_all().await {
        cancel.cancel();
        let report = opts.registry.health_report();
        tracing::error!(
            failed_module = err.module(),
            dependents = ?opts.registry.find_dependents(err.module()),
            initialized = report.initialized_modules,
            total = report.total_modules,
            "Start-up aborted"
        );
        return Err(err.into());
    }

    let report = opts.registry.health_report();
    tracing::info!(
        initialized = report.initialized_modules,
        total = report.total_modules,
        errors = report.total_errors,
        "Phase: ready"
    );

    cancel.cancelled().await;
    tracing::info!("Phase: stop");
    Ok(())
}
