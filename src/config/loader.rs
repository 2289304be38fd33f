//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from a TOML file. Validation happens once CLI
/// overrides have been applied, see [`ProxyConfig::validated`].
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

impl ProxyConfig {
    /// Run semantic validation, consuming the config on success.
    pub fn validated(self) -> Result<Self, ConfigError> {
        validate_config(&self).map_err(ConfigError::Validation)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let config = parse_config(
            r#"
            [listener]
            address = "127.0.0.1"
            port = 8080
            max_connections = 64

            [timeouts]
            connect_secs = 3
            request_secs = 15

            [obfuscation]
            enabled = true
            key = "0101010101010101010101010101010101010101010101010101010101010101"

            [observability]
            log_level = "debug"
            "#,
        )
        .unwrap()
        .validated()
        .unwrap();

        assert_eq!(config.listener.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.listener.max_connections, 64);
        assert_eq!(config.timeouts.connect_secs, 3);
        assert_eq!(config.timeouts.read_secs, 10);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            parse_config("[listener\nport = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation_message_lists_fields() {
        let err = parse_config("[listener]\nport = 0")
            .unwrap()
            .validated()
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: listener.port: must be non-zero");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/proxy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
