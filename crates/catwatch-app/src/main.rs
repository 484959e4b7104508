//! Catwatch - category examiner daemon.
//!
//! Runs the full examiner:
//! - the detection, confirmation and nightly refresh pipeline
//! - the local HTTP ingress the traffic layer posts events to

use std::path::PathBuf;
use std::sync::Arc;

use catwatch_examiner::clients::{FileListSource, HttpCloudClient, HttpIntelClient, HttpLocalFilter};
use catwatch_examiner::{
    CategoryExaminer, Confirmer, ExaminerConfig, ExaminerService, Notifier, StaticCategoryManager,
};
use catwatch_server::{AppState, Server, ServerConfig, DEFAULT_PORT};
use catwatch_storage::{ClassificationStore, Database};
use clap::Parser;
use directories::ProjectDirs;
use tokio_util::sync::CancellationToken;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Catwatch - confirms locally matched domains against authoritative category sources
#[derive(Parser, Debug)]
#[command(name = "catwatch", version, about)]
struct Args {
    /// Examiner config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database file (defaults to the app data directory)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Ingress port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log to the console as well as the log file
    #[arg(long)]
    foreground: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "catwatch", "catwatch").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("catwatch={},warn", log_level)));

    if let Some(log_dir) = logs_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("catwatch")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                if args.debug || args.foreground {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().with_writer(std::io::stdout))
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .init();
                } else {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .init();
                }

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Fallback: console logging only
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

/// Load the examiner config, or the defaults when no file is given.
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ExaminerConfig> {
    match path {
        Some(path) => ExaminerConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Config error in {:?}: {}", path, e)),
        None => {
            tracing::info!("No config file given, using defaults");
            Ok(ExaminerConfig::default())
        }
    }
}

/// Wire the examiner over its HTTP collaborators.
fn build_examiner(config: ExaminerConfig, db: Database) -> anyhow::Result<CategoryExaminer> {
    let timeout = config.request_timeout();
    let store = ClassificationStore::new(db);
    let manager = Arc::new(StaticCategoryManager::new(
        store.clone(),
        config.categories.clone(),
    ));

    let local_filter = Arc::new(HttpLocalFilter::new(&config.local_filter_url, timeout)?);
    let confirmer = Confirmer::new(
        Arc::new(HttpCloudClient::new(
            &config.cloud_url,
            config.cloud_token.clone(),
            timeout,
        )?),
        Arc::new(HttpIntelClient::new(
            &config.cloud_url,
            config.cloud_token.clone(),
            timeout,
        )?),
        FileListSource::new(&config.list_dir, timeout),
    );

    let mut notifier = Notifier::default();
    if let Some(url) = &config.notify_url {
        notifier = notifier.with_forward_url(url, timeout)?;
    }

    Ok(CategoryExaminer::new(
        config,
        store,
        manager,
        local_filter,
        confirmer,
        notifier,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive for the duration of the program
    let _log_guard = init_logging(&args);

    tracing::info!("Starting Catwatch...");
    tracing::info!("Args: {:?}", args);

    let config = load_config(args.config.as_ref())?;

    let db = match &args.db_path {
        Some(path) => Database::with_path(path),
        None => Database::new(),
    }
    .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

    let shutdown = CancellationToken::new();
    let examiner = Arc::new(build_examiner(config, db)?.with_shutdown(shutdown.clone()));
    tracing::info!(
        "Category filter is {}",
        if examiner.is_on() { "on" } else { "off" }
    );

    let service = ExaminerService::start(examiner.clone());

    let server = Server::with_state(
        ServerConfig::default().with_port(args.port),
        AppState::new(service.events(), examiner),
    )?;
    let server_token = shutdown.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(server_token).await {
            tracing::error!("Ingress server error: {}", e);
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown requested");
        }
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
    service.shutdown().await;
    if let Err(e) = server_task.await {
        tracing::error!("Ingress server task failed: {}", e);
    }

    tracing::info!("Catwatch shutting down");
    Ok(())
}
