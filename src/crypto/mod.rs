//! Stream obfuscation.
//!
//! # Data Flow
//! ```text
//! startup
//!     → key.rs (SecretKey generated once, shared read-only via Arc)
//!
//! per session, per direction
//!     → stream.rs (Obfuscator cursor starting at position 0)
//!     → ObfuscatedReader / ObfuscatedWriter around any AsyncRead / AsyncWrite
//! ```
//!
//! The transform is a repeating-key XOR. It hides payloads from casual
//! inspection and nothing more: it offers no confidentiality against anyone
//! holding a known plaintext.

pub mod key;
pub mod stream;

pub use key::{SecretKey, KEY_LEN};
pub use stream::{ObfuscatedReader, ObfuscatedWriter, Obfuscator};
