//! Error responses.
//!
//! Two flavours: an axum response for requests served by the HTTP layer, and
//! raw bytes for connections the dispatcher still owns directly (tunnel
//! requests before the confirmation line, or heads that failed to parse).

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use tokio::io::{AsyncWrite, AsyncWriteExt};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Plain-text error response for the HTTP relay.
pub fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(format!("{}\n", message)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Serialize a plain-text error response that closes the connection.
pub fn raw_error(status: StatusCode, message: &str) -> Vec<u8> {
    let body = format!("{}\n", message);
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nX-Content-Type-Options: nosniff\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status.as_u16(),
        status.canonical_reason().unwrap_or(""),
        TEXT_PLAIN,
        body.len(),
        body
    )
    .into_bytes()
}

/// Write a raw error response to a connection the dispatcher owns.
///
/// Failures are logged; the connection is closed by the caller either way.
pub async fn write_raw_error<W>(stream: &mut W, status: StatusCode, message: &str, timeout: Duration)
where
    W: AsyncWrite + Unpin,
{
    let bytes = raw_error(status, message);
    let write = async {
        stream.write_all(&bytes).await?;
        stream.flush().await
    };
    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, status = %status, "Failed to write error response"),
        Err(_) => tracing::debug!(status = %status, "Timed out writing error response"),
    }
}
