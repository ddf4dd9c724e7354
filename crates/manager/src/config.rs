//! Configuration management for the SFM manager.
//!
//! This module provides TOML-based configuration file loading.
//! The default configuration path is `~/.config/sfm/config.toml`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::DEFAULT_CHUNK_SIZE;
use crate::ipc::{frame_len_for_chunk, MAX_FRAME_BYTES};
use crate::network::NFS_PORT;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("chunk_size must be greater than 0")]
    InvalidChunkSize,

    #[error("max_upload_chunk must be between 1 and chunk_size ({chunk_size}), got {value}")]
    InvalidMaxUploadChunk { value: u64, chunk_size: u64 },

    #[error("chunk_size {chunk_size} needs a {needed} byte request line, over the {limit} byte frame limit")]
    ChunkExceedsFrame {
        chunk_size: u64,
        needed: u64,
        limit: u64,
    },

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("request_timeout_secs must be greater than 0")]
    InvalidRequestTimeout,

    #[error("duplicate filesystem id: {0}")]
    DuplicateFilesystem(String),

    #[error("filesystem id must not be empty")]
    EmptyFilesystemId,

    #[error("nfs_port must be greater than 0")]
    InvalidPort,
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the SFM manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General manager configuration.
    pub manager: ManagerConfig,

    /// Chunked transfer configuration.
    pub transfer: TransferConfig,

    /// Transfer gateway configuration.
    pub gateway: GatewayConfig,

    /// Reachability analysis configuration.
    pub network: NetworkConfig,

    /// Filesystems served by the gateway.
    pub filesystems: Vec<FilesystemConfig>,
}

/// General manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Chunked transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Download window and client chunk size in bytes.
    pub chunk_size: u64,

    /// Largest decoded upload chunk accepted, in bytes.
    pub max_upload_chunk: u64,

    /// Hold a per-target lock around every chunk write.
    pub serialize_writers: bool,
}

/// Transfer gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Unix socket path. Defaults to the per-user runtime directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Client-side timeout for a single invocation, in seconds.
    pub request_timeout_secs: u64,
}

/// Reachability analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Port that must be reachable on a mount target.
    pub nfs_port: u16,

    /// Default inventory snapshot for `netinfo`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<PathBuf>,
}

/// One filesystem served by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilesystemConfig {
    /// Filesystem id used to route invocations.
    pub id: String,

    /// Mounted root of the filesystem.
    pub root: PathBuf,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_chunk: DEFAULT_CHUNK_SIZE,
            serialize_writers: false,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nfs_port: NFS_PORT,
            inventory: None,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sfm")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - SFM_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - SFM_SOCKET_PATH: Override the gateway socket path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("SFM_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.manager.log_level = level;
            }
        }

        if let Ok(path) = std::env::var("SFM_SOCKET_PATH") {
            if !path.is_empty() {
                tracing::info!("Overriding socket_path from environment: {}", path);
                self.gateway.socket_path = Some(PathBuf::from(path));
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }

        if self.transfer.max_upload_chunk == 0
            || self.transfer.max_upload_chunk > self.transfer.chunk_size
        {
            return Err(ConfigError::InvalidMaxUploadChunk {
                value: self.transfer.max_upload_chunk,
                chunk_size: self.transfer.chunk_size,
            });
        }

        let needed = frame_len_for_chunk(self.transfer.chunk_size);
        if needed > MAX_FRAME_BYTES as u64 {
            return Err(ConfigError::ChunkExceedsFrame {
                chunk_size: self.transfer.chunk_size,
                needed,
                limit: MAX_FRAME_BYTES as u64,
            });
        }

        let level = self.manager.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.manager.log_level.clone()));
        }

        if self.gateway.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidRequestTimeout);
        }

        if self.network.nfs_port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        let mut seen = HashSet::new();
        for fs in &self.filesystems {
            if fs.id.is_empty() {
                return Err(ConfigError::EmptyFilesystemId);
            }
            if !seen.insert(fs.id.as_str()) {
                return Err(ConfigError::DuplicateFilesystem(fs.id.clone()));
            }
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
