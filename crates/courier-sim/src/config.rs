//! Simulator configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (COURIER_*), used as defaults
//! - TOML configuration file
//! - An explicit file path given as the first command line argument

use anyhow::{Context, Result};
use courier_core::RouterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Simulator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Session layout and workload.
    #[serde(default)]
    pub session: SessionConfig,

    /// Per-peer router settings.
    #[serde(default)]
    pub router: RouterSettings,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Identity of the hub peer.
    #[serde(default = "default_hub")]
    pub hub: String,

    /// Number of spoke peers joining the hub.
    #[serde(default = "default_spokes")]
    pub spokes: usize,

    /// Notification and request rounds per peer.
    #[serde(default = "default_rounds")]
    pub rounds: usize,

    /// Payload size in bytes.
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
}

/// Router settings applied to every peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Request timeout in milliseconds. Zero waits forever.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Inbound dispatch queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

// Default value functions
fn default_hub() -> String {
    std::env::var("COURIER_HUB").unwrap_or_else(|_| "hub".to_string())
}

fn default_spokes() -> usize {
    env_or("COURIER_SPOKES", 2)
}

fn default_rounds() -> usize {
    env_or("COURIER_ROUNDS", 10)
}

fn default_payload_size() -> usize {
    env_or("COURIER_PAYLOAD_SIZE", 64)
}

fn default_request_timeout() -> u64 {
    env_or("COURIER_REQUEST_TIMEOUT_MS", 30_000)
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_metrics_port() -> u16 {
    env_or("COURIER_METRICS_PORT", 9090)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hub: default_hub(),
            spokes: default_spokes(),
            rounds: default_rounds(),
            payload_size: default_payload_size(),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl RouterSettings {
    /// Convert to the router's own configuration.
    #[must_use]
    pub fn to_router_config(&self) -> RouterConfig {
        RouterConfig {
            request_timeout: (self.request_timeout_ms > 0)
                .then(|| Duration::from_millis(self.request_timeout_ms)),
            queue_capacity: self.queue_capacity,
        }
    }
}

impl Config {
    /// Load configuration from `path`, the default paths, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// an explicit `path` cannot be read.
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(shellexpand::tilde(path).as_ref());
        }

        let config_paths = [
            "courier.toml",
            "/etc/courier/courier.toml",
            "~/.config/courier/courier.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_router_settings() {
        let router = RouterSettings::default().to_router_config();
        assert_eq!(router.queue_capacity, 1024);
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let settings = RouterSettings {
            request_timeout_ms: 0,
            queue_capacity: 8,
        };
        let router = settings.to_router_config();
        assert_eq!(router.request_timeout, None);
        assert_eq!(router.queue_capacity, 8);

        let settings = RouterSettings {
            request_timeout_ms: 250,
            queue_capacity: 8,
        };
        assert_eq!(
            settings.to_router_config().request_timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [session]
            hub = "h"
            spokes = 5
            rounds = 3

            [router]
            request_timeout_ms = 500

            [metrics]
            enabled = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.session.hub, "h");
        assert_eq!(config.session.spokes, 5);
        assert_eq!(config.session.rounds, 3);
        assert_eq!(config.router.request_timeout_ms, 500);
        assert_eq!(config.router.queue_capacity, 1024);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_missing_explicit_file() {
        assert!(Config::load(Some("/nonexistent/courier.toml")).is_err());
    }
}
