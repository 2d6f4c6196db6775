//! Transport server: the event-stream endpoint, its companion
//! message-post endpoint, and process wiring.

mod registry;
mod sse;

use crate::config::TlsConfig;
use crate::rpc::RpcDispatcher;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
pub use registry::ClientRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ClientRegistry>,
    pub rpc: Arc<RpcDispatcher>,
    pub keep_alive_secs: u64,
}

/// Builds the full route table. The event-stream routes are kept off the
/// `TimeoutLayer`/`CompressionLayer` stack applied to the request/response
/// routes — both would otherwise cut or buffer a connection meant to stay
/// open indefinitely.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let streamed = Router::new()
        .route("/", get(sse::sse_handler))
        .route("/sse", get(sse::sse_handler));

    let bounded = Router::new()
        .route("/messages", post(sse::messages_handler))
        .route("/health", get(sse::health_handler))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    streamed
        .merge(bounded)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `app` on `addr`, optionally over TLS, until `shutdown` resolves.
/// Takes `tls` by value so the whole call is `'static` and spawnable.
pub async fn serve(
    addr: SocketAddr,
    app: Router,
    tls: Option<TlsConfig>,
    shutdown: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    match &tls {
        Some(tls) => serve_tls(addr, app, tls, shutdown).await,
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "transport server listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.await;
                })
                .await?;
            Ok(())
        }
    }
}

async fn serve_tls(
    addr: SocketAddr,
    app: Router,
    tls: &TlsConfig,
    shutdown: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let config =
        axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        let _ = shutdown.await;
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
    });

    info!(%addr, "transport server listening (tls)");
    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
