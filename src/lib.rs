//! Multi-source log aggregation service: ingestion, a durable
//! full-text-searchable store, and an agent-facing JSON-RPC/SSE
//! transport, wired together by [`run`].

pub mod config;
pub mod errors;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod rpc;
pub mod sink;
pub mod sources;
pub mod store;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub use config::Config;
pub use store::Store;

/// Instantiates every component in dependency order, starts the ingestion
/// plane and the transport server, and blocks until a shutdown signal
/// (ctrl-c) arrives. Teardown stops sources, then the datagram receiver,
/// then the transport, then drops the store.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // `SinkHandle::default()` already installs `TracingSink`, the legacy
    // console sink; `--legacy-console` exists to fall back to it when an
    // external terminal-UI sink is wired in later, not to switch anything
    // today.
    let sink = sink::SinkHandle::default();

    let store: store::SharedStore = Arc::new(store::Store::open(&config.store.path, sink.clone()).await?);

    let source_manager = Arc::new(sources::SourceManager::new(store.clone(), sink.clone()));
    for (path, name) in &config.ingest.tail_files {
        if let Err(e) = source_manager.add_file(path.clone(), name.clone()).await {
            sink.error("startup", format!("failed to start tail worker for {path}: {e}"));
        }
    }

    let mut receiver =
        ingest::DatagramReceiver::start(config.ingest.udp_port, store.clone(), sink.clone()).await?;

    let dispatcher = Arc::new(rpc::RpcDispatcher::new(store.clone(), source_manager.clone()));
    let registry = Arc::new(transport::ClientRegistry::new());
    let app_state = transport::AppState {
        registry,
        rpc: dispatcher,
        keep_alive_secs: config.transport.keep_alive_interval_secs,
    };
    let app = transport::router(app_state);

    let addr: SocketAddr = config.http_address().parse()?;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
    let tls = config.transport.tls.clone();

    let server_task = tokio::spawn(transport::serve(addr, app, tls, stop_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    let _ = stop_tx.send(());
    server_task.await??;

    receiver.stop().await;
    source_manager.stop_all().await;

    info!("shutdown complete");
    Ok(())
}
