// src/config.rs

//! Manages relay configuration: loading from TOML, defaults, and validation.

use crate::core::protocol::DEFAULT_MAX_FRAME_BYTES;
use crate::core::socket::DEFAULT_WRITE_TIMEOUT;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// The upper bound on any wait that must stay responsive to shutdown.
const MAX_SUSPENSION: Duration = Duration::from_secs(1);

/// TLS settings for the listener.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cert_path")]
    pub cert_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

fn default_cert_path() -> String {
    "certs/server.crt".to_string()
}
fn default_key_path() -> String {
    "certs/server.key".to_string()
}

/// Timing and sizing of the receive pipeline.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReceiverConfig {
    /// How long the receiver sleeps between checks while no socket is registered.
    #[serde(with = "humantime_serde", default = "default_acquire_backoff")]
    pub acquire_backoff: Duration,
    /// How long a single receive waits for data before the exclusive section is released.
    #[serde(with = "humantime_serde", default = "default_poll_timeout")]
    pub poll_timeout: Duration,
    /// The fixed pause taken after every poll iteration.
    #[serde(with = "humantime_serde", default = "default_iteration_delay")]
    pub iteration_delay: Duration,
    /// Lines longer than this are dropped.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Consecutive unclassified faults tolerated before the connection is torn down.
    #[serde(default = "default_max_unclassified_faults")]
    pub max_unclassified_faults: u32,
    /// How long a response write may stall before it is abandoned.
    #[serde(with = "humantime_serde", default = "default_write_timeout")]
    pub write_timeout: Duration,
    /// Capacity of the channel between the receiver and the command analyzer.
    #[serde(default = "default_analyzer_queue")]
    pub analyzer_queue: usize,
}

fn default_acquire_backoff() -> Duration {
    Duration::from_millis(500)
}
fn default_poll_timeout() -> Duration {
    Duration::from_millis(500)
}
fn default_iteration_delay() -> Duration {
    Duration::from_millis(500)
}
fn default_write_timeout() -> Duration {
    DEFAULT_WRITE_TIMEOUT
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}
fn default_max_unclassified_faults() -> u32 {
    16
}
fn default_analyzer_queue() -> usize {
    1024
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            acquire_backoff: default_acquire_backoff(),
            poll_timeout: default_poll_timeout(),
            iteration_delay: default_iteration_delay(),
            max_frame_bytes: default_max_frame_bytes(),
            write_timeout: default_write_timeout(),
            max_unclassified_faults: default_max_unclassified_faults(),
            analyzer_queue: default_analyzer_queue(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub receiver: ReceiverConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7373
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            tls: TlsConfig {
                enabled: false,
                cert_path: default_cert_path(),
                key_path: default_key_path(),
            },
            receiver: ReceiverConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }

        if self.tls.enabled {
            if self.tls.cert_path.trim().is_empty() {
                return Err(anyhow!("tls.cert_path cannot be empty when TLS is enabled"));
            }
            if self.tls.key_path.trim().is_empty() {
                return Err(anyhow!("tls.key_path cannot be empty when TLS is enabled"));
            }
        }

        let receiver = &self.receiver;
        for (name, value) in [
            ("receiver.acquire_backoff", receiver.acquire_backoff),
            ("receiver.poll_timeout", receiver.poll_timeout),
        ] {
            if value.is_zero() {
                return Err(anyhow!("{name} cannot be 0"));
            }
            if value > MAX_SUSPENSION {
                return Err(anyhow!(
                    "{name} cannot exceed {}ms, or shutdown would stall",
                    MAX_SUSPENSION.as_millis()
                ));
            }
        }
        if receiver.iteration_delay > MAX_SUSPENSION {
            warn!(
                "receiver.iteration_delay is {}ms. Inbound messages will be processed slowly.",
                receiver.iteration_delay.as_millis()
            );
        }
        if receiver.write_timeout.is_zero() {
            return Err(anyhow!("receiver.write_timeout cannot be 0"));
        }
        if receiver.max_frame_bytes == 0 {
            return Err(anyhow!("receiver.max_frame_bytes cannot be 0"));
        }
        if receiver.max_unclassified_faults == 0 {
            return Err(anyhow!("receiver.max_unclassified_faults cannot be 0"));
        }
        if receiver.analyzer_queue == 0 {
            return Err(anyhow!("receiver.analyzer_queue cannot be 0"));
        }
        Ok(())
    }
}
