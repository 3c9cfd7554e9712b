use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use modreg::{Diagnostics, ModuleRegistry, RunOptions, ShutdownOptions};
use runtime::{logging, AppConfig, CliArgs, LogBuffer, LogRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod subsystems;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Lease Desk - printer-leasing contract authoring tool
#[derive(Parser)]
#[command(name = "lease-desk")]
#[command(about = "Lease Desk - printer-leasing contract authoring tool")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every module, then wait for Ctrl+C
    Run,
    /// Validate configuration and the module dependency graph without starting anything
    Check,
    /// Start every module and write a diagnostics bundle as JSON
    Diagnostics {
        /// Output file (relative paths resolve against the home dir); stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Also write the captured recent logs as plain text
        #[arg(long)]
        logs_out: Option<PathBuf>,
    },
}

/// Registry snapshot plus captured recent logs, as consumed by the debug overlay.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugBundle {
    system_info: SystemInfo,
    registry: Diagnostics,
    recent_logs: Vec<LogRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemInfo {
    app: String,
    version: &'static str,
    platform: &'static str,
    started_at: DateTime<Utc>,
    uptime_ms: i64,
}

impl SystemInfo {
    fn capture(config: &AppConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            app: config.app.name.clone(),
            version: env!("CARGO_PKG_VERSION"),
            platform: std::env::consts::OS,
            started_at,
            uptime_ms: (Utc::now() - started_at).num_milliseconds(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let started_at = Utc::now();
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let diag_cfg = config.diagnostics_or_default();
    let log_buffer = LogBuffer::new(diag_cfg.log_capacity);
    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    logging::init_logging_from_config(
        &logging_config,
        Path::new(&config.app.home_dir),
        Some((&log_buffer, logging::level_filter(&diag_cfg.log_level))),
    );
    tracing::info!(app = %config.app.name, "Lease Desk starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let registry = Arc::new(ModuleRegistry::new());
    subsystems::register_builtin(&registry, &config);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            modreg::run(RunOptions {
                registry,
                shutdown: ShutdownOptions::Signals,
            })
            .await
        }
        Commands::Check => check(&registry, &config),
        Commands::Diagnostics { out, logs_out } => {
            let out = out.or_else(|| diag_cfg.export_path.as_ref().map(PathBuf::from));
            let exports = Exports { out, logs_out };
            diagnostics(&registry, &log_buffer, &config, started_at, exports).await
        }
    }
}

fn check(registry: &ModuleRegistry, config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    let order = registry
        .resolve()
        .context("Module dependency graph does not resolve")?;

    println!("Configuration check passed");
    println!("Home dir: {}", config.app.home_dir);
    println!("Start order: {}", order.join(" -> "));
    Ok(())
}

/// Destinations for the `diagnostics` command.
struct Exports {
    out: Option<PathBuf>,
    logs_out: Option<PathBuf>,
}

async fn diagnostics(
    registry: &ModuleRegistry,
    logs: &LogBuffer,
    config: &AppConfig,
    started_at: DateTime<Utc>,
    exports: Exports,
) -> Result<()> {
    // Degraded start-up is still exported.
    if let Err(err) = registry.start_all().await {
        tracing::warn!(error = %err, "Start-up incomplete; exporting degraded state");
    }

    let bundle = DebugBundle {
        system_info: SystemInfo::capture(config, started_at),
        registry: registry.export_diagnostics(),
        recent_logs: logs.entries(None),
    };
    let json = serde_json::to_string_pretty(&bundle).context("Failed to serialize diagnostics")?;

    match exports.out {
        Some(path) => {
            let path = write_export(config, path, &json)?;
            tracing::info!(path = %path.display(), "Diagnostics written");
        }
        None => println!("{json}"),
    }

    if let Some(path) = exports.logs_out {
        let path = write_export(config, path, &logs.render_text())?;
        tracing::info!(path = %path.display(), "Recent logs written");
    }
    Ok(())
}

/// Write `contents` to `path`, resolving relative paths against the home dir.
fn write_export(config: &AppConfig, path: PathBuf, contents: &str) -> Result<PathBuf> {
    let path = if path.is_relative() {
        Path::new(&config.app.home_dir).join(path)
    } else {
        path
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
