//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/deepquant/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/deepquant/` (~/.config/deepquant/)
//! - State/Logs: `$XDG_STATE_HOME/deepquant/` (~/.local/state/deepquant/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `api.token`
pub const TOKEN_ENV: &str = "DEEPQUANT_TOKEN";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Backend connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Settings sent with every chat request
    #[serde(default)]
    pub chat: ChatSettings,

    /// Replay pacing
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the REST API, including the `/api` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token (can also use `DEEPQUANT_TOKEN`)
    pub token: Option<String>,

    /// User id sent with chat and report requests
    pub user_id: Option<String>,

    /// Timeout in seconds. Bounds each report request end to end; for the
    /// chat stream it bounds connecting and each wait for the next bytes.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            user_id: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(Error::Config("api.base_url must not be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api.base_url must be an http(s) URL, got {}",
                url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

/// Research settings forwarded to the backend with each turn
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    /// Skip the plan review interrupt
    #[serde(default)]
    pub auto_accepted_plan: bool,

    #[serde(default = "default_max_plan_iterations")]
    pub max_plan_iterations: u32,

    #[serde(default = "default_max_step_num")]
    pub max_step_num: u32,

    /// Run a web search before planning
    #[serde(default = "default_true")]
    pub enable_background_investigation: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            auto_accepted_plan: false,
            max_plan_iterations: default_max_plan_iterations(),
            max_step_num: default_max_step_num(),
            enable_background_investigation: true,
        }
    }
}

fn default_max_plan_iterations() -> u32 {
    1
}

fn default_max_step_num() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// Delays used when a replay file does not record its own timing
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Delay before a text chunk
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    /// Delay before a tool result
    #[serde(default = "default_tool_result_delay_ms")]
    pub tool_result_delay_ms: u64,

    /// Delay before a message finishes
    #[serde(default = "default_finish_delay_ms")]
    pub finish_delay_ms: u64,

    /// Delay before anything else
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,

    /// Multiplier applied to every delay while fast-forwarding (0.0 to 1.0)
    #[serde(default)]
    pub fast_forward_scale: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            chunk_delay_ms: default_chunk_delay_ms(),
            tool_result_delay_ms: default_tool_result_delay_ms(),
            finish_delay_ms: default_finish_delay_ms(),
            default_delay_ms: default_delay_ms(),
            fast_forward_scale: 0.0,
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fast_forward_scale) {
            return Err(Error::Config(
                "replay.fast_forward_scale must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_chunk_delay_ms() -> u64 {
    50
}

fn default_tool_result_delay_ms() -> u64 {
    800
}

fn default_finish_delay_ms() -> u64 {
    500
}

fn default_delay_ms() -> u64 {
    100
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                config.api.token = Some(token);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.replay.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/deepquant/config.toml` (~/.config/deepquant/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("deepquant").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/deepquant/` (~/.local/state/deepquant/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("deepquant")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/deepquant/deepquant.log` (~/.local/state/deepquant/deepquant.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("deepquant.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// Called by the CLI before anything reads these variables.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
