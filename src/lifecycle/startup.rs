//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the secret key (configured or freshly generated)
//! - Log the startup banner
//!
//! # Design Decisions
//! - Fail fast: a key that cannot be produced is fatal
//! - The key is created exactly once and never rotated

use std::sync::Arc;

use crate::config::{ObfuscationConfig, ProxyConfig};
use crate::crypto::SecretKey;
use crate::error::KeyError;

/// Key for this process, or `None` when obfuscation is disabled.
pub fn resolve_key(config: &ObfuscationConfig) -> Result<Option<Arc<SecretKey>>, KeyError> {
    if !config.enabled {
        return Ok(None);
    }
    let key = match &config.key {
        Some(encoded) => SecretKey::from_hex(encoded)?,
        None => SecretKey::generate()?,
    };
    Ok(Some(Arc::new(key)))
}

/// Emit the one-time startup log lines.
pub fn log_startup(config: &ProxyConfig, key: Option<&SecretKey>) {
    tracing::info!(
        listen = %config.listener.bind_address(),
        max_connections = config.listener.max_connections,
        connect_timeout_secs = config.timeouts.connect_secs,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );
    match key {
        Some(key) => tracing::info!(key = %key.to_hex(), "Obfuscation enabled"),
        None => tracing::info!("Obfuscation disabled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_means_no_key() {
        let config = ObfuscationConfig {
            enabled: false,
            key: Some("00".repeat(32)),
        };
        assert!(resolve_key(&config).unwrap().is_none());
    }

    #[test]
    fn configured_key_is_used() {
        let config = ObfuscationConfig {
            enabled: true,
            key: Some("7f".repeat(32)),
        };
        let key = resolve_key(&config).unwrap().unwrap();
        assert_eq!(key.as_bytes(), &[0x7f; 32]);
    }

    #[test]
    fn missing_key_is_generated() {
        let key = resolve_key(&ObfuscationConfig::default()).unwrap();
        assert!(key.is_some());
    }
}
