//! Error taxonomy for the proxy core.
//!
//! Every per-request failure is contained in the connection task that
//! produced it. Only key and configuration errors are fatal to the process.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while handling a single inbound connection.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),

    #[error("connection closed before request head was complete")]
    UnexpectedEof,

    #[error("timed out reading request head after {0:?}")]
    HeadTimeout(Duration),

    #[error("dial {target} failed: {source}")]
    Dial {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dial {target} timed out after {timeout:?}")]
    DialTimeout { target: String, timeout: Duration },

    #[error("protocol takeover failed: {0}")]
    Hijack(String),

    #[error("HTTP connection error: {0}")]
    Http(#[from] hyper::Error),

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Errors creating or parsing the secret key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to generate secret key: {0}")]
    Generate(#[from] rand::Error),

    #[error("secret key is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("secret key must be {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

pub type Result<T, E = ProxyError> = std::result::Result<T, E>;
