//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{load_config, ConfigError, ProxyConfig};

#[derive(Debug, Parser)]
#[command(name = "obfs-forward-proxy")]
#[command(about = "Forwarding HTTP/CONNECT proxy with optional XOR stream obfuscation", long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Fixed secret key as 64 hex characters
    #[arg(long)]
    pub key: Option<String>,

    /// Relay payloads without the XOR transform
    #[arg(long)]
    pub no_obfuscation: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Defaults, then the config file, then flags; validated.
    pub fn resolve_config(&self) -> Result<ProxyConfig, ConfigError> {
        let config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };
        self.apply(config).validated()
    }

    fn apply(&self, mut config: ProxyConfig) -> ProxyConfig {
        if let Some(listen) = &self.listen {
            config.listener.address = listen.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(key) = &self.key {
            config.obfuscation.key = Some(key.clone());
        }
        if self.no_obfuscation {
            config.obfuscation.enabled = false;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        config
    }
}
