//! Configuration system for the SIL harness.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SITL_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/sitl/config.toml
//!   3. ~/.config/sitl/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wire::DEFAULT_PORT;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitlConfig {
    pub network: NetworkConfig,
    pub sim: SimConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// UDP port the bridge binds for the external driver.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Physics tick period in microseconds (10_000 = 100 Hz).
    pub tick_interval_us: u32,
    /// Status log period in milliseconds.
    pub status_log_period_ms: u64,
    /// Heartbeat period in milliseconds.
    pub heartbeat_period_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SitlConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval_us: 10_000,
            status_log_period_ms: 1_000,
            heartbeat_period_ms: 500,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("sitl")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SitlConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            SitlConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SITL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&SitlConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply SITL_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SITL_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Ok(v) = std::env::var("SITL_SIM__TICK_INTERVAL_US") {
            if let Ok(t) = v.parse() {
                self.sim.tick_interval_us = t;
            }
        }
        if let Ok(v) = std::env::var("SITL_SIM__STATUS_LOG_PERIOD_MS") {
            if let Ok(t) = v.parse() {
                self.sim.status_log_period_ms = t;
            }
        }
        if let Ok(v) = std::env::var("SITL_SIM__HEARTBEAT_PERIOD_MS") {
            if let Ok(t) = v.parse() {
                self.sim.heartbeat_period_ms = t;
            }
        }
    }
}
