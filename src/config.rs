// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::engine::types::Protocol;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Default capture device
    #[serde(default = "default_device")]
    pub device: String,

    /// Default capture pixel format (FourCC)
    #[serde(default = "default_format")]
    pub format: String,

    /// Default capture resolution, WIDTHxHEIGHT
    #[serde(default = "default_resolution")]
    pub resolution: String,

    /// Default delivery protocol
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,

    /// Default server host
    #[serde(default = "default_server")]
    pub server: String,

    /// Server port; 0 means the protocol's default
    #[serde(default)]
    pub port: u16,

    /// Stream path for server-addressed protocols
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Target encoder bitrate in kbit/s
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-candidate verification deadline in milliseconds
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,

    /// Launch attempt ceiling before a transient fault becomes terminal
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// First retry delay; doubles on each subsequent attempt
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Grace period between shutdown request and forced kill
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// RTMP connection timeout in seconds
    #[serde(default = "default_rtmp_timeout_s")]
    pub rtmp_timeout_s: u32,

    /// Extra encoder properties appended verbatim, e.g. "qp-range=20,40"
    #[serde(default)]
    pub extra_encoder_args: String,
}

fn default_device() -> String {
    "/dev/video0".to_string()
}

fn default_format() -> String {
    "UYVY".to_string()
}

fn default_resolution() -> String {
    "1280x720".to_string()
}

fn default_protocol() -> Protocol {
    Protocol::Rtmp
}

fn default_server() -> String {
    "127.0.0.1".to_string()
}

fn default_stream_path() -> String {
    "/stream/camera".to_string()
}

fn default_bitrate_kbps() -> u32 {
    2000
}

fn default_verify_timeout_ms() -> u64 {
    3000
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_stop_grace_ms() -> u64 {
    5000
}

fn default_rtmp_timeout_s() -> u32 {
    2
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            format: default_format(),
            resolution: default_resolution(),
            protocol: default_protocol(),
            server: default_server(),
            port: 0, // resolve from protocol at request build time
            stream_path: default_stream_path(),
            bitrate_kbps: default_bitrate_kbps(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_timeout_ms: default_verify_timeout_ms(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            rtmp_timeout_s: default_rtmp_timeout_s(),
            extra_encoder_args: String::new(),
        }
    }
}

impl EngineConfig {
    /// Parse `extra_encoder_args` into property pairs. Tokens without `=`
    /// are rejected so a typo fails loudly instead of corrupting the spec.
    pub fn extra_encoder_props(&self) -> Result<Vec<(String, String)>> {
        let tokens = shlex::split(&self.extra_encoder_args)
            .context("extra_encoder_args is not valid shell syntax")?;
        tokens
            .into_iter()
            .map(|token| {
                token
                    .split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .with_context(|| format!("extra encoder arg '{}' is not key=value", token))
            })
            .collect()
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("streamcast")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("streamcast")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            let config: Config = toml::from_str(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;

            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }
}
