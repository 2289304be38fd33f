//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Dispatcher: read head, classify by method)
//!         CONNECT → tunnel.rs (dial, confirm, pump raw bytes both ways)
//!         other   → hyper http1 + axum
//!                     → security::headers (strip hop-by-hop fields)
//!                     → relay.rs (forward to origin, stream response back)
//!     → response.rs (error responses for either path)
//! ```

pub mod relay;
pub mod request;
pub mod response;
pub mod server;
pub mod tunnel;

pub use relay::HttpRelay;
pub use request::{InboundRequest, RequestHead};
pub use server::{Dispatcher, ProxyServer};
pub use tunnel::{TunnelRelay, TunnelSummary, CONNECTION_ESTABLISHED};
