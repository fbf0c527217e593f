use std::{env, fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::core::frame::DEFAULT_MAX_FRAME_LEN;
use crate::core::message::MessageId;
use crate::core::registry::BrokerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub frame_backlog: usize,
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 12345,
            frame_backlog: 64,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelConfig {
    pub capacity: usize,
    pub preserve_order: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            preserve_order: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SubscriberConfig {
    pub service_type: String,
    pub subscriber_ids: Vec<MessageId>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub channel: ChannelConfig,
    pub subscribers: Vec<SubscriberConfig>,
}

impl Config {
    /// Parses TOML text without applying environment overrides.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overrides file values with `FANOUT_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = env::var("FANOUT_BIND_ADDR") {
            self.server.bind_addr = v;
        }

        if let Ok(v) = env::var("FANOUT_PORT") {
            self.server.port = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("FANOUT_PORT: {e}")))?;
        }

        if let Ok(v) = env::var("FANOUT_QUEUE_CAPACITY") {
            self.channel.capacity = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("FANOUT_QUEUE_CAPACITY: {e}")))?;
        }

        if let Ok(v) = env::var("FANOUT_PRESERVE_ORDER") {
            self.channel.preserve_order =
                matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        Ok(())
    }

    /// Rejects values the broker cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be in 1..=65535".into()));
        }
        if self.server.frame_backlog == 0 {
            return Err(ConfigError::Invalid("server.frame_backlog must be positive".into()));
        }
        if self.server.max_frame_len == 0 {
            return Err(ConfigError::Invalid("server.max_frame_len must be positive".into()));
        }
        if self.channel.capacity == 0 {
            return Err(ConfigError::Invalid("channel.capacity must be positive".into()));
        }
        if let Some(sub) = self.subscribers.iter().find(|s| s.subscriber_ids.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "subscriber '{}' has no subscriber_ids",
                sub.service_type
            )));
        }
        Ok(())
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            queue_capacity: self.channel.capacity,
            preserve_order: self.channel.preserve_order,
        }
    }
}

/// Loads, env-overrides and validates the config at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let raw: String = fs::read_to_string(path)?;
    let mut config = Config::from_toml_str(&raw)?;
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}
