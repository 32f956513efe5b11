#![forbid(unsafe_code)]

//! `sms-session-supervisor`: program session supervisor binary.
//!
//! Bootstraps configuration and the session database, cleans up detached
//! containers left by a previous run, starts the reconciliation monitor
//! and serves the HTTP API until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use sms_session_supervisor::api::{self, AppState};
use sms_session_supervisor::config::GlobalConfig;
use sms_session_supervisor::orchestrator::child_monitor;
use sms_session_supervisor::orchestrator::screen::ScreenControl;
use sms_session_supervisor::orchestrator::supervisor::SessionSupervisor;
use sms_session_supervisor::persistence::db;
use sms_session_supervisor::persistence::session_repo::SessionRepo;
use sms_session_supervisor::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "sms-session-supervisor", about = "Program session supervisor", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP port from the configuration file.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("sms-session-supervisor bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    let config = Arc::new(config);
    info!(scripts_dir = %config.scripts_dir.display(), "configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.database_path).await?);
    let repo = SessionRepo::new(Arc::clone(&db));
    info!("database connected");

    // ── Build supervisor ────────────────────────────────
    let supervisor = Arc::new(SessionSupervisor::new(
        Arc::new(repo.clone()),
        Arc::new(ScreenControl::from_config(&config)),
        config.process.restart_delay(),
    )
    .with_launch_grace(config.launch_grace()));

    if config.process.kill_detached_on_startup {
        let summary = supervisor.kill_all().await;
        info!(
            found = summary.found,
            failed = summary.failed,
            "startup cleanup of detached containers complete"
        );
    }

    // Records left running by a previous process have no registry handle.
    match supervisor.reconcile().await {
        Ok(stopped) => info!(count = stopped.len(), "startup reconciliation complete"),
        Err(err) => error!(%err, "startup reconciliation failed"),
    }

    // ── Start background tasks ──────────────────────────
    let ct = CancellationToken::new();
    let monitor_handle = config.monitor.enabled.then(|| {
        child_monitor::spawn_child_monitor(
            Arc::clone(&supervisor),
            config.monitor_interval(),
            ct.clone(),
        )
    });

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        repo,
        supervisor,
    });

    let http_ct = ct.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = api::serve(state, http_ct).await {
            error!(%err, "http server failed");
        }
    });

    info!("supervisor ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = http_handle.await;
    if let Some(handle) = monitor_handle {
        let _ = handle.await;
    }
    info!("sms-session-supervisor shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
