/// HTTP server for the wake-time API
/// Serves POST /v1/wake-times plus /health and /metrics for monitoring systems

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{self, ErrorResponse, WAKE_TIMES_PATH};
use crate::config::Config;
use crate::http::{read_request, Request, RequestError, Response};
use crate::metrics::{render_prometheus, ServiceMetrics};

/// Bind the configured address and serve until cancelled
pub async fn run_server(
    config: Arc<Config>,
    metrics: Arc<ServiceMetrics>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let addr = config.bind_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind wake-time server on {}: {}", addr, e);
            return Err(e).with_context(|| format!("Failed to bind wake-time server on {}", addr));
        }
    };

    info!("Wake-time server listening on http://{}{}", addr, WAKE_TIMES_PATH);

    serve(listener, config, metrics, cancel_token).await;
    Ok(())
}

/// Cancel `cancel_token` on Ctrl-C, or SIGTERM on unix
///
/// The SIGTERM handler is installed before this returns, so a signal sent
/// right afterwards is never lost to the default disposition.
pub fn spawn_shutdown_listener(cancel_token: CancellationToken) -> std::io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        #[cfg(unix)]
        let terminated = async move {
            sigterm.recv().await;
        };
        #[cfg(not(unix))]
        let terminated = std::future::pending::<()>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Ctrl-C received, shutting down"),
                Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
            },
            _ = terminated => info!("SIGTERM received, shutting down"),
        }
        cancel_token.cancel();
    }))
}

/// Accept loop over an already-bound listener
pub async fn serve(
    listener: TcpListener,
    config: Arc<Config>,
    metrics: Arc<ServiceMetrics>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((mut socket, peer_addr)) => {
                        let config = config.clone();
                        let metrics = metrics.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(&mut socket, &config, &metrics).await {
                                debug!("Error handling request from {}: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Wake-time server shutting down");
                break;
            }
        }
    }
}

async fn handle_connection(
    socket: &mut TcpStream,
    config: &Config,
    metrics: &ServiceMetrics,
) -> std::io::Result<()> {
    // Apply timeout to prevent slow-loris attacks
    let read = timeout(
        config.request_timeout(),
        read_request(socket, config.max_body_bytes),
    )
    .await;

    let response = match read {
        Err(_) => {
            debug!("Request timeout after {:?}", config.request_timeout());
            Response::json(408, &ErrorResponse::new("REQUEST_TIMEOUT", "Request not received in time"))
        }
        Ok(Ok(None)) => return Ok(()),
        Ok(Ok(Some(request))) => route(&request, metrics),
        Ok(Err(RequestError::Io(e))) => return Err(e),
        Ok(Err(RequestError::BodyTooLarge(len))) => {
            debug!("Rejecting {} byte body", len);
            Response::json(
                413,
                &ErrorResponse::new("PAYLOAD_TOO_LARGE", "Request body is too large"),
            )
        }
        Ok(Err(RequestError::UnsupportedEncoding(coding))) => {
            debug!("Rejecting transfer coding {:?}", coding);
            Response::json(
                501,
                &ErrorResponse::new("UNSUPPORTED_TRANSFER_ENCODING", "Only chunked transfer coding is supported"),
            )
        }
        Ok(Err(e)) => {
            debug!("Bad request: {}", e);
            Response::json(400, &ErrorResponse::new("BAD_REQUEST", "Malformed HTTP request"))
        }
    };

    socket.write_all(response.to_http().as_bytes()).await?;
    socket.flush().await?;

    linger_close(socket, config.request_timeout()).await;
    Ok(())
}

/// Most request bytes discarded after the response before giving up
const MAX_LINGER_BYTES: usize = 1024 * 1024;

/// Half-close, then discard unread input so the close does not reset the
/// connection before the peer reads the response
async fn linger_close(socket: &mut TcpStream, limit: Duration) {
    if socket.shutdown().await.is_err() {
        return;
    }

    let drain = async {
        let mut sink = [0u8; 4096];
        let mut drained = 0usize;
        while drained < MAX_LINGER_BYTES {
            match socket.read(&mut sink).await {
                Ok(0) | Err(_) => break,
                Ok(n) => drained += n,
            }
        }
        drained
    };

    match timeout(limit, drain).await {
        Ok(drained) if drained > 0 => debug!("Discarded {} unread request bytes", drained),
        Ok(_) => {}
        Err(_) => debug!("Peer kept the connection open after the response"),
    }
}

/// Dispatch a parsed request to its handler
pub fn route(request: &Request, metrics: &ServiceMetrics) -> Response {
    let response = match (request.method.as_str(), request.path.as_str()) {
        ("POST", WAKE_TIMES_PATH) => match api::handle_wake_times(&request.body) {
            Ok(wake_times) => {
                metrics.record_success();
                Response::json(200, &wake_times)
            }
            Err(error) => {
                metrics.record_rejection();
                Response::json(400, &error)
            }
        },
        (_, WAKE_TIMES_PATH) => Response::json(
            405,
            &ErrorResponse::new("METHOD_NOT_ALLOWED", "Use POST for this endpoint"),
        )
        .with_allow("POST"),
        ("GET", "/health" | "/healthz" | "/health/") => {
            Response::json(200, &json!({ "status": "healthy", "requests": metrics.status() }))
        }
        ("GET", "/metrics") => Response::text(
            200,
            "text/plain; version=0.0.4",
            render_prometheus(&metrics.status()),
        ),
        _ => Response::json(404, &ErrorResponse::new("NOT_FOUND", "Not Found")),
    };

    debug!("{} {} -> {}", request.method, request.path, response.status);
    response
}
