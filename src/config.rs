// src/config.rs
use log::{info, warn};
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::services::market_data::EvictionPolicy;
use crate::services::{ollama, yahoo};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub yahoo_base_url: String,
    pub yahoo_auto_adjust: bool,
    pub ollama_host: String,
    pub ollama_model: String,
    pub cache_policy: EvictionPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: 3030,
            yahoo_base_url: yahoo::DEFAULT_BASE_URL.to_string(),
            yahoo_auto_adjust: true,
            ollama_host: ollama::DEFAULT_HOST.to_string(),
            ollama_model: ollama::DEFAULT_MODEL.to_string(),
            cache_policy: EvictionPolicy::Never,
        }
    }
}

impl AppConfig {
    /// Reads the process environment. Call `dotenv().ok()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        match lookup("PORT") {
            Some(port) => {
                config.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "PORT",
                    value: port.clone(),
                })?;
            }
            None => warn!("$PORT not set, defaulting to {}", config.port),
        }

        if let Some(url) = lookup("YAHOO_BASE_URL") {
            config.yahoo_base_url = url;
        }

        if let Some(flag) = lookup("YAHOO_AUTO_ADJUST") {
            config.yahoo_auto_adjust = parse_bool(&flag).ok_or(ConfigError::Invalid {
                key: "YAHOO_AUTO_ADJUST",
                value: flag.clone(),
            })?;
        }

        if let Some(host) = lookup("OLLAMA_HOST") {
            config.ollama_host = host;
        }

        if let Some(model) = lookup("OLLAMA_MODEL") {
            config.ollama_model = model;
        }

        if let Some(ttl) = lookup("CACHE_TTL_SECS") {
            let secs: u64 = ttl.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "CACHE_TTL_SECS",
                value: ttl.clone(),
            })?;
            config.cache_policy = EvictionPolicy::ExpireAfter(Duration::from_secs(secs));
        }

        info!(
            "Config: port={}, yahoo={}, ollama={} model={}, cache={:?}",
            config.port, config.yahoo_base_url, config.ollama_host, config.ollama_model, config.cache_policy
        );
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
