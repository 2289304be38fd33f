//! Observability subsystem.
//!
//! All subsystems emit `tracing` events; logging.rs installs the subscriber.
//! Every accepted connection runs inside a `conn` span carrying its id and
//! peer address, so session logs can be correlated.

pub mod logging;

pub use logging::init_logging;
