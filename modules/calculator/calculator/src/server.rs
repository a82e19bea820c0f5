//! Hosting of the tonic server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use calculator_sdk::CalculatorServiceServer;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;

use crate::api::grpc::CalculatorServiceImpl;
use crate::config::ServerConfig;
use crate::domain::Service;
use crate::signals;

/// Bind the configured address.
///
/// # Errors
/// Returns an error if the address is invalid or already in use.
pub async fn bind(cfg: &ServerConfig) -> anyhow::Result<TcpListener> {
    let addr = cfg.socket_addr()?;
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind calculator server to {addr}"))
}

/// Serve on an already bound listener until `cancel` fires.
///
/// # Errors
/// Returns an error if the listener is unusable or the server fails.
pub async fn serve(
    listener: TcpListener,
    service: Arc<Service>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let bound_addr: SocketAddr = listener.local_addr()?;
    tracing::info!(%bound_addr, transport = "tcp", "calculator server listening");

    let incoming = TcpListenerStream::new(listener);
    Server::builder()
        .layer(TraceLayer::new_for_grpc())
        .add_service(CalculatorServiceServer::new(CalculatorServiceImpl::new(service)))
        .serve_with_incoming_shutdown(incoming, async move {
            cancel.cancelled().await;
        })
        .await
        .context("calculator server failed")?;

    tracing::info!(%bound_addr, "calculator server stopped");
    Ok(())
}

/// Run until a shutdown signal arrives, then drain for at most `shutdown_timeout`.
///
/// # Errors
/// Returns an error if binding fails, the server fails, or draining exceeds
/// the shutdown timeout.
pub async fn run(cfg: &ServerConfig, service: Arc<Service>) -> anyhow::Result<()> {
    let listener = bind(cfg).await?;
    let cancel = CancellationToken::new();
    let mut handle = tokio::spawn(serve(listener, service, cancel.clone()));

    tokio::select! {
        joined = &mut handle => {
            return joined.context("server task panicked")?;
        }
        signal = signals::wait_for_shutdown() => signal?,
    }

    cancel.cancel();
    drain(handle, cfg.shutdown_timeout()).await
}

async fn drain(
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
    timeout: Duration,
) -> anyhow::Result<()> {
    match tokio::time::timeout(timeout, handle).await {
        Ok(joined) => joined.context("server task panicked")?,
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "graceful shutdown timed out");
            anyhow::bail!("calculator server did not stop within {}s", timeout.as_secs())
        }
    }
}
