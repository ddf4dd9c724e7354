//! Gateway service: serves the transfer gateway over IPC.
//!
//! This module provides the `GatewayService` that accepts IPC connections,
//! answers each request on its own, and runs every backend invocation on a
//! blocking worker. Shutdown stops the accept loop and waits for in-flight
//! connections to finish.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::gateway::TransferGateway;
use crate::ipc::{IpcConnection, IpcError, IpcRequest, IpcResponse, IpcServer, MAX_FRAME_BYTES};

/// Serves a [`TransferGateway`] on an [`IpcServer`].
pub struct GatewayService {
    /// Routing table shared with every connection task.
    gateway: Arc<TransferGateway>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
    /// Connection tasks still running.
    tracker: TaskTracker,
}

impl GatewayService {
    /// Creates a service for `gateway`.
    pub fn new(gateway: TransferGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
            shutdown_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Returns the shutdown token for external tasks to trigger or observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Accept connections until shutdown, then wait for open connections.
    pub async fn run(&self, server: IpcServer) -> std::io::Result<()> {
        info!(
            socket = %server.path().display(),
            filesystems = ?self.gateway.filesystems(),
            "Gateway listening"
        );

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("Gateway accept loop received shutdown signal");
                    break;
                }
                accepted = server.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let gateway = Arc::clone(&self.gateway);
                            let token = self.shutdown_token.clone();
                            self.tracker.spawn(Self::serve_connection(gateway, conn, token));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        info!("Gateway stopped");
        Ok(())
    }

    /// Stop accepting connections.
    pub fn stop(&self) {
        self.shutdown_token.cancel();
    }

    async fn serve_connection(
        gateway: Arc<TransferGateway>,
        mut conn: IpcConnection,
        token: CancellationToken,
    ) {
        debug!("Connection opened");
        loop {
            let request = tokio::select! {
                _ = token.cancelled() => break,
                request = conn.read_request() => request,
            };

            let response = match request {
                Ok(Some(request)) => Self::handle_request(&gateway, request).await,
                Ok(None) => break,
                Err(IpcError::Json(e)) => {
                    warn!(error = %e, "Malformed IPC request");
                    IpcResponse::Error {
                        message: format!("malformed request: {}", e),
                    }
                }
                Err(IpcError::FrameTooLarge(len)) => {
                    warn!(len, limit = MAX_FRAME_BYTES, "Oversized IPC request");
                    IpcResponse::Error {
                        message: format!(
                            "request of {} bytes exceeds the {} byte frame limit",
                            len, MAX_FRAME_BYTES
                        ),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Closing connection");
                    break;
                }
            };

            if let Err(e) = conn.send_response(&response).await {
                warn!(error = %e, "Failed to send IPC response");
                break;
            }
        }
        debug!("Connection closed");
    }

    /// Answer one request.
    pub async fn handle_request(gateway: &Arc<TransferGateway>, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Ping => IpcResponse::Pong,
            IpcRequest::Filesystems => IpcResponse::Filesystems {
                ids: gateway.filesystems(),
            },
            IpcRequest::Invoke {
                filesystem_id,
                event,
            } => {
                let gateway = Arc::clone(gateway);
                let invocation =
                    tokio::task::spawn_blocking(move || gateway.route(&filesystem_id, &event));

                match invocation.await {
                    Ok(Ok(payload)) => IpcResponse::Invoked { payload },
                    Ok(Err(e)) => {
                        warn!(error = %e, "Invocation not routed");
                        IpcResponse::Error {
                            message: e.to_string(),
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Invocation worker failed");
                        IpcResponse::Error {
                            message: "invocation failed".to_string(),
                        }
                    }
                }
            }
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }
    Ok(())
}
