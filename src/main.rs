//! # PDF Compressor Service - Main Entry Point
//!
//! Questo è il punto di ingresso principale del servizio.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line e delle variabili d'ambiente con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Costruzione e validazione della configurazione
//! - Avvio del timer di pulizia e del server HTTP
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (config file, porta, preset, timeout, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` vince)
//! 3. Carica il file di configurazione e applica gli override
//! 4. Crea le directory di lavoro e verifica la presenza di Ghostscript
//! 5. Avvia lo sweep periodico e il server axum
//! 6. Su Ctrl-C / SIGTERM ferma lo sweep e chiude il server in modo graceful
//!
//! ## Esempio di utilizzo:
//! ```bash
//! PORT=8000 GS_COMPRESSION_PRESET=strong pdf-compressor --config service.json --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pdf_compressor_service::http::{build_router, AppState};
use pdf_compressor_service::platform::PlatformCommands;
use pdf_compressor_service::{start_sweep_timer, CompressError, Config, FileManager, GhostscriptInvoker};

#[derive(Parser)]
#[command(name = "pdf-compressor")]
#[command(about = "HTTP service that compresses PDFs with Ghostscript")]
struct Args {
    /// JSON configuration file; flags and environment variables override it
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// HTTP listen port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Runtime environment ("development" adds error details to responses)
    #[arg(long, env = "APP_ENV")]
    app_env: Option<String>,

    /// Upload size limit in megabytes
    #[arg(long, env = "MAX_FILE_SIZE_MB")]
    max_file_size_mb: Option<u64>,

    /// Allowed CORS origin
    #[arg(long, env = "CORS_ORIGIN")]
    cors_origin: Option<String>,

    /// Rate limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS")]
    rate_limit_window_secs: Option<u64>,

    /// Requests admitted per client per window
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS")]
    rate_limit_max_requests: Option<u32>,

    /// Seconds between two cleanup sweeps
    #[arg(long, env = "CLEANUP_INTERVAL_SECS")]
    cleanup_interval_secs: Option<u64>,

    /// Files older than this many seconds are swept
    #[arg(long, env = "FILE_MAX_AGE_SECS")]
    file_max_age_secs: Option<u64>,

    /// Preset used when the request names none or an unknown one
    #[arg(long, env = "GS_COMPRESSION_PRESET")]
    default_preset: Option<String>,

    /// Ghostscript timeout in seconds
    #[arg(long, env = "GS_TIMEOUT_SECS")]
    engine_timeout_secs: Option<u64>,

    /// Ghostscript binary (default: gs, or gswin64c on Windows)
    #[arg(long, env = "GS_COMMAND")]
    engine_command: Option<PathBuf>,

    /// Directory for uploaded files
    #[arg(long, env = "UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Directory for compressed files
    #[arg(long, env = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(app_env) = self.app_env {
            config.development = app_env.eq_ignore_ascii_case("development");
        }
        if let Some(mb) = self.max_file_size_mb {
            config.max_file_size_mb = mb;
        }
        if let Some(origin) = self.cors_origin {
            config.cors_origin = origin;
        }
        if let Some(secs) = self.rate_limit_window_secs {
            config.rate_limit_window_secs = secs;
        }
        if let Some(max) = self.rate_limit_max_requests {
            config.rate_limit_max_requests = max;
        }
        if let Some(secs) = self.cleanup_interval_secs {
            config.cleanup_interval_secs = secs;
        }
        if let Some(secs) = self.file_max_age_secs {
            config.file_max_age_secs = secs;
        }
        if let Some(preset) = self.default_preset {
            config.default_preset = preset;
        }
        if let Some(secs) = self.engine_timeout_secs {
            config.engine_timeout_secs = secs;
        }
        if let Some(command) = self.engine_command {
            config.engine_command = Some(command);
        }
        if let Some(dir) = self.upload_dir {
            config.upload_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    FileManager::ensure_directories(&[config.upload_dir.as_path(), config.output_dir.as_path()]).await?;

    let engine = config.engine_command();
    if let Err(e) = check_engine(&engine).await {
        warn!("{}: compression requests will fail until Ghostscript is installed", e);
    }
    info!("Platform: {}", PlatformCommands::system_info());

    let sweeper = start_sweep_timer(
        vec![config.upload_dir.clone(), config.output_dir.clone()],
        config.cleanup_interval(),
        config.file_max_age(),
    );

    let port = config.port;
    let development = config.development;
    let cors_origin = config.cors_origin.clone();
    let invoker = GhostscriptInvoker::new(engine, config.engine_timeout());
    info!("Ghostscript timeout: {}s", invoker.timeout().as_secs());
    let state = Arc::new(AppState::new(config, Box::new(invoker)));
    let router = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("PDF Compression API listening on http://{}", addr);
    info!(
        "Environment: {}, CORS origin: {}",
        if development { "development" } else { "production" },
        cors_origin
    );

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            sweeper.cancel().await;
        })
        .await?;

    info!("HTTP server closed");
    Ok(())
}

async fn check_engine(command: &Path) -> Result<(), CompressError> {
    let name = command.to_string_lossy();
    if PlatformCommands::instance().is_command_available(&name).await {
        info!("Ghostscript found: {}", name);
        Ok(())
    } else {
        Err(CompressError::MissingDependency(name.into_owned()))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received: closing HTTP server");
}
