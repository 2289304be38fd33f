//! Inbound request head parsing.
//!
//! # Responsibilities
//! - Read the request head from a raw client connection
//! - Parse method, target, version and headers (order and duplicates kept)
//! - Hand back every byte read so the connection can be replayed
//!
//! # Design Decisions
//! - The dispatcher parses the head itself, before any HTTP server machinery
//!   touches the socket, so a `CONNECT` leaves the raw connection in our hands
//! - Head size and header count are bounded

use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ProxyError, Result};

/// Largest request head accepted, in bytes.
pub const MAX_HEAD_BYTES: usize = 32 * 1024;

/// Largest number of header fields accepted.
pub const MAX_HEADERS: usize = 64;

/// A parsed inbound request head.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Request target as sent: an absolute URL, an origin-form path, or `host:port` for `CONNECT`.
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub peer: SocketAddr,
}

impl InboundRequest {
    /// Whether this request asks for a raw tunnel.
    pub fn is_tunnel(&self) -> bool {
        self.method == Method::CONNECT
    }

    /// `host:port` to dial for a `CONNECT` request.
    pub fn tunnel_target(&self) -> Result<String> {
        let authority = Authority::from_str(&self.target).map_err(|e| {
            ProxyError::MalformedRequest(format!("invalid CONNECT target '{}': {}", self.target, e))
        })?;
        let port = authority.port_u16().ok_or_else(|| {
            ProxyError::MalformedRequest(format!("CONNECT target '{}' has no port", self.target))
        })?;
        Ok(format!("{}:{}", authority.host(), port))
    }
}

/// A request head together with the raw bytes it was parsed from.
#[derive(Debug)]
pub struct RequestHead {
    pub request: InboundRequest,
    /// Every byte read from the connection so far, head first.
    pub buffered: Vec<u8>,
    /// Length of the head within `buffered`.
    pub head_len: usize,
}

impl RequestHead {
    /// Bytes the client sent after the head.
    pub fn trailing(&self) -> &[u8] {
        &self.buffered[self.head_len..]
    }
}

/// Read from `stream` until a complete request head has arrived.
pub async fn read_request_head<S>(stream: &mut S, peer: SocketAddr) -> Result<RequestHead>
where
    S: AsyncRead + Unpin,
{
    let mut buffered = Vec::with_capacity(8 * 1024);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ProxyError::UnexpectedEof);
        }
        buffered.extend_from_slice(&chunk[..n]);

        if let Some((request, head_len)) = parse_request_head(&buffered, peer)? {
            return Ok(RequestHead {
                request,
                buffered,
                head_len,
            });
        }
        if buffered.len() >= MAX_HEAD_BYTES {
            return Err(ProxyError::HeadTooLarge(MAX_HEAD_BYTES));
        }
    }
}

/// Parse a request head from `buf`. Returns `None` while the head is incomplete.
pub fn parse_request_head(buf: &[u8], peer: SocketAddr) -> Result<Option<(InboundRequest, usize)>> {
    let mut header_slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut header_slots);
    let head_len = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(ProxyError::MalformedRequest(e.to_string())),
    };
    if head_len > MAX_HEAD_BYTES {
        return Err(ProxyError::HeadTooLarge(MAX_HEAD_BYTES));
    }

    let malformed = || ProxyError::MalformedRequest("incomplete request line".into());
    let method = Method::from_bytes(parsed.method.ok_or_else(malformed)?.as_bytes())
        .map_err(|e| ProxyError::MalformedRequest(e.to_string()))?;
    let target = parsed.path.ok_or_else(malformed)?.to_string();
    let version = match parsed.version.ok_or_else(malformed)? {
        0 => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut headers = HeaderMap::with_capacity(parsed.headers.len());
    for header in parsed.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| ProxyError::MalformedRequest(e.to_string()))?;
        let value = HeaderValue::from_bytes(header.value)
            .map_err(|e| ProxyError::MalformedRequest(e.to_string()))?;
        headers.append(name, value);
    }

    Ok(Some((
        InboundRequest {
            method,
            target,
            version,
            headers,
            peer,
        },
        head_len,
    )))
}
