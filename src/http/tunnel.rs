//! `CONNECT` tunnel relay.
//!
//! # Session states
//! ```text
//! Dialing ──ok──▶ Confirming ──ok──▶ Relaying ──both pumps done──▶ Closed
//!    │                 │
//!    └─ 503 to client  └─ logged, both connections dropped
//! ```
//!
//! # Design Decisions
//! - The dispatcher owns the raw client socket, so no protocol takeover is needed
//! - One task per direction inside a `JoinSet`; the session ends when both are joined
//! - The first pump to stop signals the other through a watch channel, which
//!   interrupts any read or write it is parked on
//! - Idleness is tracked per session: a pump only gives up once neither
//!   direction has moved a byte for the whole idle window
//! - With obfuscation on, the client leg is transformed in both directions:
//!   client bytes are decoded before reaching the origin and origin bytes are
//!   encoded before reaching the client, each direction counting from zero

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::TimeoutConfig;
use crate::crypto::{ObfuscatedReader, ObfuscatedWriter, SecretKey};
use crate::error::{ProxyError, Result};
use crate::http::request::InboundRequest;
use crate::http::response::write_raw_error;

/// Sent to the client once the origin connection is up.
pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// Direction of one half of a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToOrigin,
    OriginToClient,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::ClientToOrigin => f.write_str("client->origin"),
            Direction::OriginToClient => f.write_str("origin->client"),
        }
    }
}

/// Byte counts of a finished tunnel session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelSummary {
    pub client_to_origin: u64,
    pub origin_to_client: u64,
}

impl TunnelSummary {
    fn record(&mut self, direction: Direction, bytes: u64) {
        match direction {
            Direction::ClientToOrigin => self.client_to_origin = bytes,
            Direction::OriginToClient => self.origin_to_client = bytes,
        }
    }
}

/// Last moment either direction of a session moved bytes.
#[derive(Debug, Clone)]
struct Activity {
    started: Instant,
    last_millis: Arc<AtomicU64>,
}

impl Activity {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            last_millis: Arc::new(AtomicU64::new(0)),
        }
    }

    fn touch(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last_millis.fetch_max(elapsed, Ordering::Relaxed);
    }

    fn quiet_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_millis.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }
}

/// Why a pump stopped.
#[derive(Debug)]
enum PumpEnd {
    Eof,
    PeerClosed,
    Idle,
    Error(std::io::Error),
}

/// Handles `CONNECT` requests on connections the dispatcher owns.
#[derive(Debug, Clone)]
pub struct TunnelRelay {
    key: Option<Arc<SecretKey>>,
    connect_timeout: Duration,
    write_timeout: Duration,
    idle_timeout: Duration,
}

impl TunnelRelay {
    pub fn new(key: Option<Arc<SecretKey>>, timeouts: &TimeoutConfig) -> Self {
        Self {
            key,
            connect_timeout: timeouts.connect(),
            write_timeout: timeouts.write(),
            idle_timeout: timeouts.idle(),
        }
    }

    /// Run one tunnel session to completion.
    ///
    /// `client` must already be positioned after the request head; any bytes
    /// the client pipelined behind the head should be replayed by it.
    pub async fn handle<S>(&self, mut client: S, request: &InboundRequest) -> Result<TunnelSummary>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let target = match request.tunnel_target() {
            Ok(target) => target,
            Err(e) => {
                write_raw_error(&mut client, StatusCode::BAD_REQUEST, &e.to_string(), self.write_timeout).await;
                return Err(e);
            }
        };

        // Dialing
        let origin = match self.dial(&target).await {
            Ok(origin) => origin,
            Err(e) => {
                tracing::warn!(upstream = %target, error = %e, "Tunnel dial failed");
                let message = format!("Connection failed: {}", e);
                write_raw_error(&mut client, StatusCode::SERVICE_UNAVAILABLE, &message, self.write_timeout).await;
                return Err(e);
            }
        };

        // Confirming
        let confirm = async {
            client.write_all(CONNECTION_ESTABLISHED).await?;
            client.flush().await
        };
        match tokio::time::timeout(self.write_timeout, confirm).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(upstream = %target, error = %e, "Confirmation error");
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(upstream = %target, "Confirmation timed out");
                return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "confirmation write timed out").into());
            }
        }

        tracing::debug!(upstream = %target, "Tunnel established");

        // Relaying
        let summary = self.relay(client, origin).await;
        tracing::debug!(
            upstream = %target,
            client_to_origin = summary.client_to_origin,
            origin_to_client = summary.origin_to_client,
            "Tunnel closed"
        );
        Ok(summary)
    }

    async fn dial(&self, target: &str) -> Result<TcpStream> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                Ok(stream)
            }
            Ok(Err(source)) => Err(ProxyError::Dial {
                target: target.to_string(),
                source,
            }),
            Err(_) => Err(ProxyError::DialTimeout {
                target: target.to_string(),
                timeout: self.connect_timeout,
            }),
        }
    }

    /// Pump bytes both ways until either side stops.
    pub async fn relay<C, O>(&self, client: C, origin: O) -> TunnelSummary
    where
        C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        O: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (client_read, client_write) = tokio::io::split(client);
        let (origin_read, origin_write) = tokio::io::split(origin);
        // Both receivers exist before either pump can signal.
        let (closed_tx, closed_rx) = watch::channel(false);
        let closed = Arc::new(closed_tx);
        let activity = Activity::new();

        let mut pumps = JoinSet::new();
        match &self.key {
            Some(key) => {
                pumps.spawn(self.pump(
                    Direction::ClientToOrigin,
                    ObfuscatedReader::new(client_read, key.clone()),
                    origin_write,
                    closed.clone(),
                    closed_rx.clone(),
                    activity.clone(),
                ));
                pumps.spawn(self.pump(
                    Direction::OriginToClient,
                    origin_read,
                    ObfuscatedWriter::new(client_write, key.clone()),
                    closed,
                    closed_rx,
                    activity,
                ));
            }
            None => {
                pumps.spawn(self.pump(
                    Direction::ClientToOrigin,
                    client_read,
                    origin_write,
                    closed.clone(),
                    closed_rx.clone(),
                    activity.clone(),
                ));
                pumps.spawn(self.pump(
                    Direction::OriginToClient,
                    origin_read,
                    client_write,
                    closed,
                    closed_rx,
                    activity,
                ));
            }
        }

        let mut summary = TunnelSummary::default();
        while let Some(joined) = pumps.join_next().await {
            match joined {
                Ok((direction, bytes)) => summary.record(direction, bytes),
                Err(e) => tracing::error!(error = %e, "Tunnel pump task failed"),
            }
        }
        summary
    }

    fn pump<R, W>(
        &self,
        direction: Direction,
        src: R,
        dst: W,
        closed: Arc<watch::Sender<bool>>,
        peer_closed: watch::Receiver<bool>,
        activity: Activity,
    ) -> impl std::future::Future<Output = (Direction, u64)> + Send + 'static
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let idle = self.idle_timeout;
        let write_timeout = self.write_timeout;
        async move {
            let (end, bytes) =
                copy_until_closed(src, dst, &closed, peer_closed, &activity, idle, write_timeout).await;
            match end {
                PumpEnd::Eof => tracing::trace!(%direction, bytes, "Source reached end of stream"),
                PumpEnd::PeerClosed => tracing::trace!(%direction, bytes, "Stopped by opposite direction"),
                PumpEnd::Idle => tracing::debug!(%direction, bytes, idle = ?idle, "Tunnel idle timeout"),
                PumpEnd::Error(e) => tracing::debug!(%direction, bytes, error = %e, "Tunnel stream error"),
            }
            (direction, bytes)
        }
    }
}

/// Copy `src` into `dst` until `src` ends or fails, the session idles out, or the
/// opposite direction signals through `peer_closed`. Signals `closed` and shuts
/// `dst` down on exit.
async fn copy_until_closed<R, W>(
    mut src: R,
    mut dst: W,
    closed: &watch::Sender<bool>,
    mut peer_closed: watch::Receiver<bool>,
    activity: &Activity,
    idle: Duration,
    write_timeout: Duration,
) -> (PumpEnd, u64)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    let end = 'session: loop {
        let n = loop {
            let window = idle.saturating_sub(activity.quiet_for());
            if window.is_zero() {
                break 'session PumpEnd::Idle;
            }
            tokio::select! {
                _ = peer_closed.changed() => break 'session PumpEnd::PeerClosed,
                read = tokio::time::timeout(window, src.read(&mut buf)) => match read {
                    // The other direction may have moved meanwhile.
                    Err(_) => continue,
                    Ok(Ok(0)) => break 'session PumpEnd::Eof,
                    Ok(Ok(n)) => break n,
                    Ok(Err(e)) => break 'session PumpEnd::Error(e),
                },
            }
        };
        activity.touch();

        let written = tokio::select! {
            _ = peer_closed.changed() => break PumpEnd::PeerClosed,
            written = tokio::time::timeout(write_timeout, dst.write_all(&buf[..n])) => written,
        };
        match written {
            Ok(Ok(())) => {
                total += n as u64;
                activity.touch();
            }
            Ok(Err(e)) => break PumpEnd::Error(e),
            Err(_) => {
                break PumpEnd::Error(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "write timed out",
                ))
            }
        }
    };

    closed.send_replace(true);
    let _ = tokio::time::timeout(write_timeout, dst.shutdown()).await;
    (end, total)
}
