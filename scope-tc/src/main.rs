use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scope_tc::config::DEFAULT_PLUGIN_ID;
use scope_tc::ingest::{
    DockerEventSource, EVENT_CHANNEL_CAPACITY, EventSource, run_ingester, spawn_source,
};
use scope_tc::rest::{AppState, create_router};
use scope_tc::{
    ContainerStore, ControlDispatcher, ControlRegistry, EvictionPolicy, PluginConfig,
    ReportBuilder, server,
};

#[derive(Parser)]
#[command(name = "scope-tc")]
#[command(about = "Scope plugin reporting Docker containers and running per-container controls")]
struct Args {
    /// Plugin ID announced to Scope
    #[arg(long, default_value = DEFAULT_PLUGIN_ID)]
    plugin_id: String,

    /// Unix socket to listen on (default: /var/run/scope/plugins/<id>/<id>.sock)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Listen on a TCP address instead of a Unix socket
    #[arg(short, long, conflicts_with = "socket")]
    listen: Option<SocketAddr>,

    /// Drop destroyed containers from memory instead of keeping them hidden
    #[arg(long)]
    evict_destroyed: bool,

    /// Docker CLI used to follow container events
    #[arg(long, default_value = "docker")]
    docker_bin: PathBuf,

    /// Do not follow Docker events
    #[arg(long)]
    no_docker: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scope_tc=info".parse()?))
        .init();

    let args = Args::parse();

    let plugin = PluginConfig::with_id(args.plugin_id);
    let eviction = if args.evict_destroyed {
        EvictionPolicy::EvictDestroyed
    } else {
        EvictionPolicy::Retain
    };
    let store = ContainerStore::new(eviction);
    let registry = ControlRegistry::builtin();

    info!(plugin_id = %plugin.id, eviction = ?eviction, controls = registry.len(), "Starting scope-tc");

    // Event ingestion
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let ingester = tokio::spawn(run_ingester(store.clone(), event_rx));
    let source_task = if args.no_docker {
        warn!("Docker event source disabled, no containers will be reported");
        drop(event_tx);
        None
    } else {
        let source: Arc<dyn EventSource> =
            Arc::new(DockerEventSource::new(args.docker_bin, store.clone()));
        Some(spawn_source(source, event_tx))
    };

    let app_state = Arc::new(AppState {
        reporter: ReportBuilder::new(store.clone(), registry.clone(), &plugin),
        dispatcher: ControlDispatcher::new(store, registry),
    });
    let router = create_router(app_state);

    match args.listen {
        Some(addr) => server::serve_tcp(router, addr, shutdown_signal()).await?,
        None => {
            let socket = args.socket.unwrap_or_else(|| plugin.socket_path());
            server::serve_unix(router, &socket, shutdown_signal()).await?
        }
    }

    if let Some(task) = source_task {
        task.abort();
    }
    ingester.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = signal::ctrl_c();
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = ctrl_c.await;
            info!("Received SIGINT");
        }
    }
}
