//! Configuration management for AirCom.
//!
//! Configuration is read from a TOML document. Every section and field has a
//! default so a node can start from an empty file and override only what it
//! needs.

use crate::error::{ConfigError, CoreError};
use crate::types::MAX_NODE_ID_LEN;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub network: NetworkConfig,
    pub health: HealthConfig,
    pub cache: CacheConfig,
    pub channels: ChannelsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node_id: String,
    pub callsign: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "aircom-0001".to_string(),
            callsign: "AIRCOM".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub discovery_port: u16,
    pub voice_port: u16,
    pub text_port: u16,
    pub cot_port: u16,
    /// Router loop period
    pub router_interval_ms: u64,
    /// Upper bound on inbound frames dispatched per router iteration
    pub max_inbound_per_tick: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_port: 4299,
            voice_port: 5000,
            text_port: 5001,
            cot_port: 6969,
            router_interval_ms: 100,
            max_inbound_per_tick: 16,
        }
    }
}

impl NetworkConfig {
    pub fn router_interval(&self) -> Duration {
        Duration::from_millis(self.router_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_secs: u64,
    /// Delay before the first round so discovery can populate contacts
    pub startup_delay_secs: u64,
    /// Contacts and link stats older than this are pruned
    pub staleness_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            startup_delay_secs: 10,
            staleness_secs: 90,
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cached messages kept while disconnected; the oldest is evicted beyond this
    pub high_water_mark: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub ui_update_capacity: usize,
    pub outgoing_message_capacity: usize,
    pub audio_command_capacity: usize,
    pub incoming_message_capacity: usize,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            ui_update_capacity: 5,
            outgoing_message_capacity: 5,
            audio_command_capacity: 5,
            incoming_message_capacity: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    /// Reject values the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.node_id.is_empty() {
            return Err(invalid("node.node_id", "must not be empty"));
        }
        if self.node.node_id.len() > MAX_NODE_ID_LEN {
            return Err(invalid(
                "node.node_id",
                format!("longer than {} bytes", MAX_NODE_ID_LEN),
            ));
        }
        if self.node.callsign.is_empty() {
            return Err(invalid("node.callsign", "must not be empty"));
        }

        let ports = [
            self.network.discovery_port,
            self.network.voice_port,
            self.network.text_port,
            self.network.cot_port,
        ];
        for (i, port) in ports.iter().enumerate() {
            if *port == 0 {
                return Err(invalid("network", "ports must be non-zero"));
            }
            if ports[i + 1..].contains(port) {
                return Err(invalid("network", format!("port {} assigned twice", port)));
            }
        }
        if self.network.router_interval_ms == 0 {
            return Err(invalid("network.router_interval_ms", "must be non-zero"));
        }
        if self.network.max_inbound_per_tick == 0 {
            return Err(invalid("network.max_inbound_per_tick", "must be non-zero"));
        }

        if self.health.interval_secs == 0 {
            return Err(invalid("health.interval_secs", "must be non-zero"));
        }
        if self.health.staleness_secs < self.health.interval_secs {
            return Err(invalid(
                "health.staleness_secs",
                "must not be shorter than the health interval",
            ));
        }

        if self.cache.high_water_mark == 0 {
            return Err(invalid("cache.high_water_mark", "must be non-zero"));
        }

        let capacities = [
            self.channels.ui_update_capacity,
            self.channels.outgoing_message_capacity,
            self.channels.audio_command_capacity,
            self.channels.incoming_message_capacity,
        ];
        if capacities.contains(&0) {
            return Err(invalid("channels", "capacities must be non-zero"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
