//! Configuration loading for the chainward supervisor.
//!
//! Loads `chainward.toml` with per-section defaults. Every section uses
//! `#[serde(default)]`, so a minimal config file needs only `daemon.binary`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal at initialization and surface to the caller before
/// supervision ever starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config at {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A value is missing or outside its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The home directory could not be determined for default paths.
    #[error("could not determine a home directory")]
    NoHome,
}

/// Top-level chainward configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainwardConfig {
    /// Managed daemon binary and launch options.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Status poll timing and sync thresholds.
    #[serde(default)]
    pub checks: ChecksConfig,

    /// Auto-restart limits.
    #[serde(default)]
    pub restart: RestartConfig,

    /// Metrics publishing settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Managed daemon binary and launch options.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Path to the node daemon binary. Required.
    #[serde(default)]
    pub binary: PathBuf,

    /// Data directory passed to the daemon (`--data-dir`). The daemon's own
    /// default applies when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Checkpoint source (path or URI) passed through to the daemon as
    /// `--load-checkpoints`. Never interpreted by the supervisor.
    #[serde(default = "default_checkpoints")]
    pub checkpoints: String,

    /// Host of the daemon's local status RPC.
    #[serde(default = "default_rpc_host")]
    pub rpc_host: String,

    /// Port of the daemon's local status RPC.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Additional arguments appended to the daemon command line verbatim.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::new(),
            data_dir: None,
            checkpoints: default_checkpoints(),
            rpc_host: default_rpc_host(),
            rpc_port: default_rpc_port(),
            extra_args: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Base URL of the daemon's status RPC.
    pub fn rpc_base_url(&self) -> String {
        format!("http://{}:{}", self.rpc_host, self.rpc_port)
    }
}

/// Status poll timing and sync thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct ChecksConfig {
    /// Seconds between daemon status polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds before a single status poll is abandoned.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Consecutive failed polls before the daemon is declared down.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,

    /// Blocks behind the network height before a synced daemon is declared
    /// desynchronized.
    #[serde(default = "default_max_deviance")]
    pub max_deviance: u64,

    /// Network block target time in seconds, used to estimate the network
    /// hash rate from difficulty.
    #[serde(default = "default_block_target_secs")]
    pub block_target_secs: u64,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            max_poll_failures: default_max_poll_failures(),
            max_deviance: default_max_deviance(),
            block_target_secs: default_block_target_secs(),
        }
    }
}

/// Auto-restart limits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestartConfig {
    /// Maximum automatic restarts per rolling hour. Zero means unlimited,
    /// which is the base policy of restarting on every exit.
    #[serde(default)]
    pub limit_per_hour: u32,
}

/// Metrics publishing settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Path of the JSON status report. Setting this installs the metrics
    /// capability; leaving it unset disables all gauge operations.
    #[serde(default)]
    pub status_file: Option<PathBuf>,
}

impl ChainwardConfig {
    /// Validate that configuration values are within sane bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first violated bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.binary.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("daemon.binary must be set".to_owned()));
        }
        if self.daemon.checkpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "daemon.checkpoints must not be empty".to_owned(),
            ));
        }
        if self.daemon.rpc_host.is_empty() {
            return Err(ConfigError::Invalid(
                "daemon.rpc_host must not be empty".to_owned(),
            ));
        }
        if self.daemon.rpc_port == 0 {
            return Err(ConfigError::Invalid(
                "daemon.rpc_port must be nonzero".to_owned(),
            ));
        }
        if self.checks.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "checks.poll_interval_secs must be >= 1".to_owned(),
            ));
        }
        if self.checks.poll_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "checks.poll_timeout_secs must be >= 1".to_owned(),
            ));
        }
        if self.checks.max_poll_failures == 0 {
            return Err(ConfigError::Invalid(
                "checks.max_poll_failures must be >= 1".to_owned(),
            ));
        }
        if self.checks.block_target_secs == 0 {
            return Err(ConfigError::Invalid(
                "checks.block_target_secs must be >= 1".to_owned(),
            ));
        }
        if self.restart.limit_per_hour > 60 {
            return Err(ConfigError::Invalid(
                "restart.limit_per_hour must be <= 60".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Load and validate chainward configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn load_config(path: &Path) -> Result<ChainwardConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ChainwardConfig =
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

/// Resolve the root directory for chainward state (`~/.chainward/`).
///
/// # Errors
///
/// Returns [`ConfigError::NoHome`] if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let home = directories::BaseDirs::new().ok_or(ConfigError::NoHome)?;
    Ok(home.home_dir().join(".chainward"))
}

/// Default location of the config file (`~/.chainward/chainward.toml`).
///
/// # Errors
///
/// Returns [`ConfigError::NoHome`] if the home directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("chainward.toml"))
}

// Default value functions for serde

fn default_checkpoints() -> String {
    "./checkpoints.csv".to_owned()
}
fn default_rpc_host() -> String {
    "127.0.0.1".to_owned()
}
fn default_rpc_port() -> u16 {
    11898
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_poll_timeout_secs() -> u64 {
    2
}
fn default_max_poll_failures() -> u32 {
    3
}
fn default_max_deviance() -> u64 {
    5
}
fn default_block_target_secs() -> u64 {
    30
}
