//! engine-agent main entry point
//!
//! This binary runs the reconciliation loop against the control plane and
//! offers one-shot commands for operators: validating or applying a local
//! desired-configuration document and probing engine versions.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use engine_agent::{
    agent::Reconciler,
    api::ApiClient,
    config::AgentConfig,
    engine::{EngineSet, Payload},
    monitoring::{export_json, Monitor},
    runtime::Manager,
    APP_NAME, VERSION,
};
use tokio::{signal, sync::watch};

/// Node agent for sing-box and awg2 engines
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (TOML); environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reconciliation loop
    Run,

    /// Validate a desired-configuration document
    Validate(DocumentArgs),

    /// Validate and apply a desired-configuration document once
    Apply(DocumentArgs),

    /// Probe the installed engine versions
    Versions,

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
struct DocumentArgs {
    /// Desired-configuration JSON document
    #[arg(short, long)]
    file: PathBuf,

    /// Whether sing-box is enabled
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    singbox: bool,

    /// Whether awg2 is enabled
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    awg2: bool,
}

impl DocumentArgs {
    fn engines(&self) -> EngineSet {
        EngineSet::new(self.singbox, self.awg2)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Execute command
    if let Err(e) = run(cli).await {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize structured logging with tracing
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the CLI command
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Version => {
            println!("{} v{}", APP_NAME, VERSION);
            Ok(())
        }
        Commands::Run => {
            info!("Starting {} v{}", APP_NAME, VERSION);
            let config = AgentConfig::load(cli.config.as_deref())?;
            run_agent(config).await
        }
        Commands::Validate(args) => {
            let payload = read_document(&args.file)?;
            engine_agent::engine::validate(&payload, args.engines())?;
            println!("{}: configuration is valid", args.file.display());
            Ok(())
        }
        Commands::Apply(args) => {
            let config = AgentConfig::load(cli.config.as_deref())?;
            let payload = read_document(&args.file)?;
            let manager = Manager::new(&config);
            manager.validate(&payload, args.engines())?;
            let applied = manager.apply(&payload, args.engines()).await?;
            println!(
                "Applied {} (sing-box: {}, awg2: {})",
                args.file.display(),
                applied.singbox,
                applied.awg2
            );
            Ok(())
        }
        Commands::Versions => {
            let config = AgentConfig::load(cli.config.as_deref())?;
            let versions = Manager::new(&config).engine_versions().await;
            println!("sing-box: {}", versions.singbox);
            println!("awg2: {}", versions.awg2);
            Ok(())
        }
    }
}

fn read_document(path: &Path) -> anyhow::Result<Payload> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&raw)?)
}

async fn run_agent(config: AgentConfig) -> anyhow::Result<()> {
    info!(
        "Control plane: {}, runtime mode: {}",
        config.api_base_url, config.runtime_mode
    );

    let monitor = Arc::new(Monitor::new());
    let client = ApiClient::from_config(&config)?;
    let reconciler = Reconciler::new(client, Manager::new(&config), &config)
        .with_monitor(Arc::clone(&monitor));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    if let Some(addr) = &config.status_addr {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Status server listening on {}", addr);
        let app = create_http_server(Arc::clone(&monitor));
        let rx = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(wait_for_shutdown(rx))
                .await
            {
                error!("Status server failed: {}", e);
            }
        });
    }

    reconciler.run(wait_for_shutdown(shutdown_rx)).await;
    info!("Shutting down agent");
    Ok(())
}

/// Create HTTP server with routes
fn create_http_server(monitor: Arc<Monitor>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(monitor)
}

/// Health check endpoint
async fn healthz(State(monitor): State<Arc<Monitor>>) -> impl IntoResponse {
    let stats = monitor.stats();
    let check = engine_agent::monitoring::check_health(&stats);
    let code = if check.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let body = serde_json::json!({
        "status": check.status.to_string(),
        "details": check.details,
        "stats": export_json(&stats),
    });
    (code, Json(body))
}

/// Metrics endpoint (Prometheus format)
async fn metrics(State(monitor): State<Arc<Monitor>>) -> impl IntoResponse {
    (StatusCode::OK, monitor.export_prometheus())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
