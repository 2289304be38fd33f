//! Forwarding HTTP proxy with `CONNECT` tunnels and an optional XOR stream transform.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use crypto::SecretKey;
pub use error::{ProxyError, Result};
pub use http::{Dispatcher, ProxyServer};
pub use lifecycle::Shutdown;
