//! Relay settings
//!
//! Settings come from an optional JSON file; command-line flags then
//! override individual values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use crate::common::Address;
use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 2101;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_VERBOSITY: u8 = 1;
pub const MAX_VERBOSITY: u8 = 2;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Caster the stream is pulled from
    #[serde(default)]
    pub source: EndpointConfig,

    /// Caster the stream is pushed to
    #[serde(default)]
    pub destination: EndpointConfig,

    /// NMEA GGA sentence reported to the source caster
    #[serde(default)]
    pub gga: Option<String>,

    /// Idle timeout per connection; 0 disables it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub log: LogConfig,

    /// Write the process id here while running
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
}

/// One caster endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub server: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub mountpoint: String,

    #[serde(default)]
    pub login: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

/// Log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Debug mode: more detail per verbosity step and a settings dump at startup
    #[serde(default)]
    pub debug: bool,

    /// 0..=2, larger values are clamped
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_verbosity() -> u8 {
    DEFAULT_VERBOSITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: EndpointConfig::default(),
            destination: EndpointConfig::default(),
            gga: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log: LogConfig::default(),
            pid_file: None,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: DEFAULT_PORT,
            mountpoint: String::new(),
            login: None,
            password: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            verbosity: DEFAULT_VERBOSITY,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Example file for `--gen-config`
    pub fn example() -> Self {
        Self {
            source: EndpointConfig {
                server: "source.caster.example".to_string(),
                mountpoint: "RTCM3".to_string(),
                login: Some("user".to_string()),
                password: Some("secret".to_string()),
                ..EndpointConfig::default()
            },
            destination: EndpointConfig {
                server: "destination.caster.example".to_string(),
                mountpoint: "RTCM3_RELAY".to_string(),
                ..EndpointConfig::default()
            },
            ..Self::default()
        }
    }

    /// Both servers must be given
    pub fn validate(&self) -> Result<()> {
        if self.source.server.is_empty() {
            return Err(Error::Config("You must specify source server location".into()));
        }
        if self.destination.server.is_empty() {
            return Err(Error::Config("You must specify destination server location".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// GGA sentence, if a non-empty one is configured
    pub fn gga(&self) -> Option<&str> {
        self.gga.as_deref().filter(|s| !s.is_empty())
    }

    /// Copy with passwords masked, for the settings dump
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for endpoint in [&mut copy.source, &mut copy.destination] {
            if endpoint.password.as_deref().is_some_and(|p| !p.is_empty()) {
                endpoint.password = Some("********".to_string());
            }
        }
        copy
    }
}

impl EndpointConfig {
    pub fn address(&self) -> Address {
        Address::new(self.server.clone(), self.port)
    }

    /// Login and password, if either one is non-empty
    pub fn credentials(&self) -> Option<(String, String)> {
        let login = self.login.clone().unwrap_or_default();
        let password = self.password.clone().unwrap_or_default();
        if login.is_empty() && password.is_empty() {
            None
        } else {
            Some((login, password))
        }
    }
}

impl LogConfig {
    pub fn verbosity(&self) -> u8 {
        self.verbosity.min(MAX_VERBOSITY)
    }

    /// Tracing level for the configured mode and verbosity
    pub fn level(&self) -> Level {
        match (self.debug, self.verbosity()) {
            (true, 0) => Level::INFO,
            (true, 1) => Level::DEBUG,
            (true, _) => Level::TRACE,
            (false, 0 | 1) => Level::ERROR,
            (false, _) => Level::INFO,
        }
    }
}
