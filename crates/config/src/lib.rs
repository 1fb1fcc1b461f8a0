//! Configuration loading, validation, and management for Blockwright.
//!
//! Loads configuration from `~/.blockwright/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.blockwright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Planning and execution limits
    #[serde(default)]
    pub builder: BuilderConfig,

    /// Where the world listener runs and how to talk to it
    #[serde(default)]
    pub world: WorldConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    16384
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("builder", &self.builder)
            .field("world", &self.world)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Upper bound on operations in one plan
    #[serde(default = "default_max_operations")]
    pub max_operations: usize,

    /// Re-drafts allowed after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between world mutations, in milliseconds
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Teleport the agent above each cell before placing
    #[serde(default = "default_true")]
    pub move_agent: bool,

    /// Read every cell back after placing
    #[serde(default)]
    pub verify: bool,

    /// Required namespace for palette materials
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_max_operations() -> usize {
    600
}
fn default_max_retries() -> u32 {
    2
}
fn default_throttle_ms() -> u64 {
    50
}
fn default_namespace() -> String {
    blockwright_core::palette::DEFAULT_NAMESPACE.into()
}

impl BuilderConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_retries: default_max_retries(),
            throttle_ms: default_throttle_ms(),
            move_agent: true,
            verify: false,
            namespace: default_namespace(),
        }
    }
}

/// Shared by the transport client and the dispatcher: both ends read the
/// same address from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_world_host")]
    pub host: String,

    #[serde(default = "default_world_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Longest wait for a single reply
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Reconnect-and-resend budget per command after a dropped connection
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Largest accepted frame, in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_world_host() -> String {
    "127.0.0.1".into()
}
fn default_world_port() -> u16 {
    25560
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_read_timeout() -> u64 {
    30
}
fn default_reconnect_attempts() -> u32 {
    1
}
fn default_max_frame_bytes() -> usize {
    1024 * 1024
}

impl WorldConfig {
    /// `host:port`, for display and for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// A config pointing at an already-bound socket (tests, embedded listeners).
    pub fn for_addr(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
            ..Self::default()
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            host: default_world_host(),
            port: default_world_port(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            reconnect_attempts: default_reconnect_attempts(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.blockwright/config.toml).
    ///
    /// Also checks environment variables:
    /// - `BLOCKWRIGHT_API_KEY` (highest priority), `OPENAI_API_KEY`, `OPENROUTER_API_KEY`
    /// - `BLOCKWRIGHT_PROVIDER`, `BLOCKWRIGHT_MODEL`
    /// - `BLOCKWRIGHT_WORLD_HOST`, `BLOCKWRIGHT_WORLD_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            self.api_key = lookup("BLOCKWRIGHT_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("OPENROUTER_API_KEY"));
        }

        if let Some(provider) = lookup("BLOCKWRIGHT_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("BLOCKWRIGHT_MODEL") {
            self.default_model = model;
        }

        if let Some(host) = lookup("BLOCKWRIGHT_WORLD_HOST") {
            self.world.host = host;
        }

        if let Some(port) = lookup("BLOCKWRIGHT_WORLD_PORT") {
            self.world.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("BLOCKWRIGHT_WORLD_PORT is not a port: {port}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".blockwright")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.builder.max_operations == 0 {
            return Err(ConfigError::ValidationError(
                "builder.max_operations must be > 0".into(),
            ));
        }

        if self.builder.namespace.trim().is_empty() || self.builder.namespace.contains(':') {
            return Err(ConfigError::ValidationError(
                "builder.namespace must be a bare namespace such as \"minecraft\"".into(),
            ));
        }

        if self.world.read_timeout_secs == 0 || self.world.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "world timeouts must be > 0 seconds".into(),
            ));
        }

        if self.world.max_frame_bytes < 64 {
            return Err(ConfigError::ValidationError(
                "world.max_frame_bytes must be at least 64".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            builder: BuilderConfig::default(),
            world: WorldConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
