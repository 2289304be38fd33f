//! Request dispatcher and accept loop.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener, one task each
//! - Read and log the request head
//! - Route `CONNECT` to the tunnel relay on the raw socket
//! - Route everything else through hyper + axum to the header sanitizer and HTTP relay
//! - Drain in-flight sessions on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, Response, StatusCode},
    Router,
};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::{ProxyConfig, TimeoutConfig};
use crate::crypto::SecretKey;
use crate::error::{ProxyError, Result};
use crate::http::relay::HttpRelay;
use crate::http::request::read_request_head;
use crate::http::response::{error_response, write_raw_error};
use crate::http::tunnel::TunnelRelay;
use crate::net::{ConnectionTracker, Listener, ListenerError, PrefixedStream};
use crate::security::headers::strip_hop_by_hop;

/// How long shutdown waits for in-flight sessions.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Classifies each inbound request and hands it to the matching relay.
///
/// Cheap to clone; every clone shares the same immutable key.
#[derive(Clone)]
pub struct Dispatcher {
    tunnel: TunnelRelay,
    router: Router,
    timeouts: TimeoutConfig,
}

impl Dispatcher {
    pub fn new(timeouts: TimeoutConfig, key: Option<Arc<SecretKey>>) -> Self {
        let relay = HttpRelay::new(key.clone(), &timeouts);
        let router = Router::new()
            .fallback(relay_handler)
            .with_state(relay)
            .layer(TraceLayer::new_for_http());

        Self {
            tunnel: TunnelRelay::new(key, &timeouts),
            router,
            timeouts,
        }
    }

    /// Serve the single request carried by `stream`.
    pub async fn serve_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let read_timeout = self.timeouts.read();
        let head = match tokio::time::timeout(read_timeout, read_request_head(&mut stream, peer)).await {
            Ok(Ok(head)) => head,
            Ok(Err(e @ (ProxyError::MalformedRequest(_) | ProxyError::HeadTooLarge(_)))) => {
                write_raw_error(&mut stream, StatusCode::BAD_REQUEST, &e.to_string(), self.timeouts.write()).await;
                return Err(e);
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(ProxyError::HeadTimeout(read_timeout)),
        };

        let request = &head.request;
        tracing::info!(
            method = %request.method,
            uri = %request.target,
            version = ?request.version,
            "Received request"
        );
        tracing::debug!(headers = ?request.headers, "Request headers");

        if request.is_tunnel() {
            let client = PrefixedStream::new(stream, head.trailing().to_vec());
            self.tunnel.handle(client, request).await?;
            return Ok(());
        }

        let io = TokioIo::new(PrefixedStream::new(stream, head.buffered));
        http1::Builder::new()
            .keep_alive(false)
            .timer(TokioTimer::new())
            .header_read_timeout(read_timeout)
            .serve_connection(io, TowerToHyperService::new(self.router.clone()))
            .await?;
        Ok(())
    }
}

/// Sanitize and relay a non-tunnel request.
async fn relay_handler(State(relay): State<HttpRelay>, mut request: Request<Body>) -> Response<Body> {
    if request.method() == Method::CONNECT {
        // Tunnels are claimed before the HTTP layer owns the socket.
        let e = ProxyError::Hijack("connection is owned by the HTTP layer".into());
        tracing::error!(error = %e, "CONNECT reached the HTTP relay");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
    }

    strip_hop_by_hop(request.headers_mut());
    relay.forward(request).await
}

/// Forwarding proxy server: accept loop plus dispatcher.
pub struct ProxyServer {
    dispatcher: Dispatcher,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Create a server. `key` enables the stream transform when present.
    pub fn new(config: ProxyConfig, key: Option<Arc<SecretKey>>) -> Self {
        Self {
            dispatcher: Dispatcher::new(config.timeouts, key),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Accept connections until `shutdown` fires, then drain in-flight sessions.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "Proxy server starting");

        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => accepted,
            };

            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(error = %e, "Accept failed");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let guard = self.tracker.track();
            let span = tracing::info_span!("conn", id = %guard.id(), peer = %peer);
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(
                async move {
                    let _permit = permit;
                    let _guard = guard;
                    if let Err(e) = dispatcher.serve_connection(stream, peer).await {
                        tracing::debug!(error = %e, "Connection ended with error");
                    }
                }
                .instrument(span),
            );
        }

        tracing::info!(active = self.tracker.active_count(), "Shutdown signal received, draining");
        if !self.tracker.drain(DRAIN_TIMEOUT).await {
            tracing::warn!(active = self.tracker.active_count(), "Drain timed out");
        }
        tracing::info!("Proxy server stopped");
        Ok(())
    }
}
