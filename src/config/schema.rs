//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the forwarding proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (address, port, connection limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Stream transform settings.
    pub obfuscation: ObfuscationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Address to listen on (e.g., "0.0.0.0").
    pub address: String,

    /// Port to listen on.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// `address:port`, bracketing IPv6 literals.
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8081,
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Tunnel dial timeout in seconds.
    pub connect_secs: u64,

    /// Relay request timeout (until origin response headers) in seconds.
    pub request_secs: u64,

    /// Time allowed for a client to send its request head, in seconds.
    pub read_secs: u64,

    /// Time allowed for a single raw write to a peer, in seconds.
    pub write_secs: u64,

    /// Tunnel inactivity timeout in seconds.
    pub idle_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 30,
            read_secs: 10,
            write_secs: 10,
            idle_secs: 60,
        }
    }
}

/// Stream transform configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObfuscationConfig {
    /// Apply the XOR transform to relayed payloads.
    pub enabled: bool,

    /// Fixed key as 64 hex characters. A random key is generated when absent.
    pub key: Option<String>,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address(), "0.0.0.0:8081");
        assert_eq!(config.timeouts.connect(), Duration::from_secs(10));
        assert_eq!(config.timeouts.request(), Duration::from_secs(30));
        assert!(config.obfuscation.enabled);
        assert!(config.obfuscation.key.is_none());
    }

    #[test]
    fn ipv6_bind_address() {
        let listener = ListenerConfig {
            address: "::1".into(),
            port: 9000,
            ..Default::default()
        };
        assert_eq!(listener.bind_address(), "[::1]:9000");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            port = 3128

            [obfuscation]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.port, 3128);
        assert_eq!(config.listener.address, "0.0.0.0");
        assert!(!config.obfuscation.enabled);
        assert_eq!(config.timeouts.idle_secs, 60);
    }
}
