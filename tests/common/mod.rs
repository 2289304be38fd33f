//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use obfs_forward_proxy::config::ProxyConfig;
use obfs_forward_proxy::crypto::{Obfuscator, SecretKey, KEY_LEN};
use obfs_forward_proxy::net::Listener;
use obfs_forward_proxy::{ProxyServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

pub fn test_key() -> Arc<SecretKey> {
    let mut bytes = [0u8; KEY_LEN];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = 0xa5 ^ (i as u8).wrapping_mul(29);
    }
    Arc::new(SecretKey::from_bytes(bytes))
}

/// Apply the transform to `data` as a stream starting at position 0.
pub fn transform(key: &Arc<SecretKey>, data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    Obfuscator::new(key.clone()).apply(&mut out);
    out
}

/// Start a proxy on an ephemeral port. Keep the returned `Shutdown` alive for the test.
pub async fn start_proxy(key: Option<Arc<SecretKey>>) -> (SocketAddr, Shutdown) {
    let mut config = ProxyConfig::default();
    config.listener.address = "127.0.0.1".into();
    config.timeouts.connect_secs = 2;
    config.timeouts.request_secs = 5;

    let raw = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = raw.local_addr().unwrap();
    let listener = Listener::from_listener(raw, config.listener.max_connections).unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = ProxyServer::new(config, key);
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Address nothing is listening on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Start a mock HTTP origin that answers every request with `200 OK` and `body`.
/// Each received request head is forwarded on the returned channel.
pub async fn start_http_origin(body: &'static str) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let _ = tx.send(head);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-Origin: a\r\nX-Origin: b\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// Start a TCP origin that hands every accepted socket to the test.
pub async fn start_tcp_origin() -> (SocketAddr, mpsc::UnboundedReceiver<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            if tx.send(socket).is_err() {
                break;
            }
        }
    });

    (addr, rx)
}

/// Start a TCP origin that echoes everything back.
pub async fn start_echo_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = socket.into_split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
            });
        }
    });

    addr
}

/// Read an HTTP head (up to and including the blank line) as text.
pub async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => break,
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Read until the peer closes, bounded by [`IO_TIMEOUT`].
pub async fn read_to_close(socket: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    tokio::time::timeout(IO_TIMEOUT, socket.read_to_end(&mut out))
        .await
        .expect("peer did not close in time")
        .unwrap();
    out
}

/// Split a raw response into (head, body).
pub fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator")
        + 4;
    (
        String::from_utf8_lossy(&raw[..end]).into_owned(),
        raw[end..].to_vec(),
    )
}
