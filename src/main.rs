use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cr_assistant::config::{get_config_dir, load_config};
use cr_assistant::settings::SettingsStore;
use cr_assistant::state::AppState;
use cr_assistant::{host, server};

/// Native messaging host for the Control Room assistant extension.
///
/// Chrome starts the host with the calling extension's origin as the first
/// argument (and `--parent-window` on Windows).
#[derive(Parser, Debug)]
#[command(name = "cr-assistant", version)]
struct Cli {
    /// Origin of the extension that launched the host
    origin: Option<String>,

    /// Native window handle of the calling browser window
    #[arg(long)]
    parent_window: Option<i64>,

    /// Directory holding config.toml, settings.toml and logs
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Port of the loopback HTTP server, overriding config.toml
    #[arg(long)]
    port: Option<u16>,
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Logs go to stderr and a daily file; stdout belongs to the extension.
fn init_tracing(config_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = config_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("cr-assistant")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    std::fs::create_dir_all(&config_dir)?;
    init_tracing(&config_dir)?;

    let mut config = load_config(&config_dir)?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    let settings = SettingsStore::load(&config_dir)?;

    tracing::info!(
        origin = cli.origin.as_deref().unwrap_or("unknown"),
        parent_window = ?cli.parent_window,
        config_dir = %config_dir.display(),
        "cr-assistant starting"
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let writer = host::spawn_writer(rx, io::stdout());
    let state = Arc::new(AppState::with_http(config, settings, tx.clone())?);

    let addr = format!("127.0.0.1:{}", state.config.port);
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            tracing::info!("HTTP server listening on {}", addr);
            let app = server::router(state.clone());
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("HTTP server stopped: {}", e);
                }
            });
        }
        // Another browser profile may already own the port; stdio still works.
        Err(e) => tracing::warn!("HTTP server disabled, cannot bind {}: {}", addr, e),
    }

    let monitor = {
        let state = state.clone();
        tokio::spawn(async move { state.connection.run(state.page.as_ref()).await })
    };

    let sweeper = {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(state.config.sweep_interval());
            loop {
                interval.tick().await;
                state.sweep_tabs().await;
            }
        })
    };

    host::serve(state.clone(), io::stdin(), tx).await;

    monitor.abort();
    sweeper.abort();
    drop(state);
    // The server task still holds a sender, so the queue never closes here.
    let _ = tokio::time::timeout(std::time::Duration::from_millis(200), writer).await;

    tracing::info!("cr-assistant exiting");
    Ok(())
}
