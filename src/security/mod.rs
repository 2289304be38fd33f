//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Non-tunnel request:
//!     → headers.rs (strip hop-by-hop fields)
//!     → Pass to HTTP relay
//! ```

pub mod headers;

pub use headers::strip_hop_by_hop;
