//! Plain HTTP relay.
//!
//! # Responsibilities
//! - Rebuild the inbound request as an outbound one (method, URL, headers, body)
//! - Execute it against the origin under the request timeout
//! - Return the origin status and headers unchanged and stream the body back,
//!   through the XOR transform when obfuscation is on
//!
//! # Design Decisions
//! - No retries, no connection reuse: each relay opens its own origin connection
//! - The transform is length-preserving, so `Content-Length` stays valid
//! - Once the response head is out, body errors only abort the connection

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{header, HeaderMap, Request, Response, StatusCode, Uri};
use futures_util::StreamExt;
use hyper::body::{Bytes, Incoming};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::TimeoutConfig;
use crate::crypto::{Obfuscator, SecretKey};
use crate::http::response::error_response;

/// Forwards non-`CONNECT` requests to their origin.
#[derive(Clone)]
pub struct HttpRelay {
    client: Client<HttpConnector, Body>,
    key: Option<Arc<SecretKey>>,
    request_timeout: Duration,
}

impl HttpRelay {
    pub fn new(key: Option<Arc<SecretKey>>, timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Self {
            client,
            key,
            request_timeout: timeouts.request(),
        }
    }

    /// Relay a sanitized request and produce the response for the client.
    pub async fn forward(&self, request: Request<Body>) -> Response<Body> {
        let (parts, body) = request.into_parts();

        let uri = match absolute_uri(&parts.uri, &parts.headers) {
            Some(uri) => uri,
            None => {
                tracing::warn!(uri = %parts.uri, "Request target has no host");
                return error_response(StatusCode::BAD_REQUEST, "Request target has no host");
            }
        };

        let mut outbound = Request::new(body);
        *outbound.method_mut() = parts.method;
        *outbound.uri_mut() = uri.clone();
        *outbound.headers_mut() = parts.headers;

        let response = match tokio::time::timeout(self.request_timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(uri = %uri, error = %e, "Upstream error");
                return error_response(StatusCode::BAD_GATEWAY, &format!("Target server error: {}", e));
            }
            Err(_) => {
                tracing::warn!(uri = %uri, timeout = ?self.request_timeout, "Upstream timeout");
                return error_response(
                    StatusCode::GATEWAY_TIMEOUT,
                    &format!("Target server error: no response within {:?}", self.request_timeout),
                );
            }
        };

        tracing::debug!(uri = %uri, status = %response.status(), "Upstream responded");

        let (parts, body) = response.into_parts();
        let body = match &self.key {
            Some(key) => obfuscated_body(body, key.clone()),
            None => Body::new(body),
        };
        Response::from_parts(parts, body)
    }
}

/// Stream `body` through a fresh client-bound transform.
fn obfuscated_body(body: Incoming, key: Arc<SecretKey>) -> Body {
    let mut obfuscator = Obfuscator::new(key);
    let stream = Body::new(body).into_data_stream().map(move |chunk| match chunk {
        Ok(bytes) => {
            let mut buf = bytes.to_vec();
            obfuscator.apply(&mut buf);
            Ok(Bytes::from(buf))
        }
        Err(e) => {
            tracing::warn!(error = %e, position = obfuscator.position(), "Response body copy failed");
            Err(e)
        }
    });
    Body::from_stream(stream)
}

/// Absolute `http://` URI for the request, falling back to the `Host` header
/// for origin-form targets.
pub fn absolute_uri(uri: &Uri, headers: &HeaderMap) -> Option<Uri> {
    if uri.authority().is_some() {
        return Some(uri.clone());
    }

    let host = headers.get(header::HOST)?.to_str().ok()?;
    let authority = Authority::from_str(host).ok()?;
    let mut parts = uri.clone().into_parts();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority = Some(authority);
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some("/".parse().ok()?);
    }
    Uri::from_parts(parts).ok()
}
