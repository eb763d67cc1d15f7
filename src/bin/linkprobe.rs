use clap::Parser;
use log::{error, info};
use std::sync::Arc;

use linkprobe::config::{CliOverrides, Config};
use linkprobe::logging;
use linkprobe::prober::Prober;
use linkprobe::report::ReportRenderer;
use linkprobe::server::{self, AppState};
use linkprobe::store::BatchStore;

/// Probe URLs for reachability and record resumable batches
#[derive(Debug, Parser)]
#[command(name = "linkprobe", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<String>,

    /// Address to listen on (host:port)
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory holding persisted batch records
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Per-request probe timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Maximum number of probes simultaneously awaiting network I/O
    #[arg(long)]
    max_concurrent_probes: Option<usize>,

    /// Custom User-Agent for probe requests
    #[arg(long)]
    user_agent: Option<String>,

    /// Seconds to wait for outstanding batches at shutdown
    #[arg(long)]
    shutdown_grace: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Silence all logging
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> linkprobe::Result<()> {
    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load_from_standard_locations(),
    };
    config.merge_with_cli(&CliOverrides {
        bind_address: cli.bind.clone(),
        data_dir: cli.data_dir.clone(),
        timeout: cli.timeout,
        max_concurrent_probes: cli.max_concurrent_probes,
        user_agent: cli.user_agent.clone(),
        shutdown_grace: cli.shutdown_grace,
        verbose: cli.verbose,
    });
    config.validate()?;

    logging::init_logger(config.verbose.unwrap_or(false), cli.quiet);
    logging::log_config_info(&config);

    let store = Arc::new(BatchStore::open(config.data_dir()).await?);
    let prober = Arc::new(Prober::new(&config)?);

    // Batches interrupted by the previous shutdown are retried from scratch.
    let pending = store.list_pending_batches().await;
    if !pending.is_empty() {
        info!("found {} pending batch(es) to resume", pending.len());
        server::resume_pending_batches(&store, &prober, pending);
    }

    let renderer = ReportRenderer::new(config.report_rows_per_page());
    let state = Arc::new(AppState::new(Arc::clone(&store), prober, renderer));
    let app = server::router(state);

    let addr = config.bind_address()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The listener is closed; give in-flight batches a bounded window to
    // finish. Whatever remains stays `processing` on disk and resumes at
    // the next start.
    let outstanding = store
        .wait_for_completion(config.shutdown_grace_duration())
        .await;
    if outstanding > 0 {
        info!("{outstanding} batch(es) left on disk for resumption at next start");
    }
    info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!("failed to listen for ctrl-c: {err}");
            }
        }
        _ = terminate => {}
    }

    info!("received shutdown signal, no longer accepting new work");
}
