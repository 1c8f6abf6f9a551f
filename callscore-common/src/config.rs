//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`CALLSCORE_ROOT_FOLDER`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CALLSCORE_ROOT_FOLDER";

/// Environment variable overriding the subscription mode
pub const SUBSCRIPTION_MODE_ENV: &str = "CALLSCORE_SUBSCRIPTION_MODE";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "callscore.db";

/// Default listen address for the service
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";

/// Default ceiling for uploaded audio (100 MiB)
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 100 * 1024 * 1024;

/// Whether usage limits are checked and recorded.
///
/// Passed explicitly to the admission collaborator on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    /// Limits are checked and usage is recorded
    #[default]
    Enforced,
    /// Every action is allowed and no usage is recorded (testing/internal use)
    Bypassed,
}

impl SubscriptionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionMode::Enforced => "enforced",
            SubscriptionMode::Bypassed => "bypassed",
        }
    }
}

impl FromStr for SubscriptionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforced" => Ok(SubscriptionMode::Enforced),
            "bypassed" | "bypass" => Ok(SubscriptionMode::Bypassed),
            other => Err(Error::Config(format!(
                "Unknown subscription mode '{}' (expected 'enforced' or 'bypassed')",
                other
            ))),
        }
    }
}

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// Intake section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Largest accepted audio upload in bytes
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,
}

fn default_max_audio_bytes() -> usize {
    DEFAULT_MAX_AUDIO_BYTES
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self { max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES }
    }
}

/// Figures section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiguresConfig {
    /// Reference time zone for month attribution, minutes east of UTC
    #[serde(default)]
    pub default_utc_offset_minutes: i32,
}

/// Usage ledger section of the TOML config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Calls per organization per calendar month (0 = unlimited)
    #[serde(default)]
    pub monthly_call_limit: u32,
}

/// Connection settings for an upstream HTTP collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Complete TOML configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub figures: FiguresConfig,
    #[serde(default)]
    pub usage: UsageConfig,
    pub subscription_mode: Option<SubscriptionMode>,
    #[serde(default)]
    pub scoring: UpstreamConfig,
    #[serde(default)]
    pub transcription: UpstreamConfig,
}

impl TomlConfig {
    /// Load the config file if present; missing or unreadable files yield defaults.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Self {
        let path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => match default_config_file() {
                Some(path) => path,
                None => {
                    info!("No config file found, using defaults");
                    return Self::default();
                }
            },
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Config file {} not usable ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Subscription mode with the environment override applied
    pub fn resolve_subscription_mode(&self) -> Result<SubscriptionMode> {
        if let Ok(value) = std::env::var(SUBSCRIPTION_MODE_ENV) {
            let mode = value.parse()?;
            info!("Subscription mode '{}' from environment", value);
            return Ok(mode);
        }
        Ok(self.subscription_mode.unwrap_or_default())
    }

    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }
}

/// Locate the default configuration file for the platform
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("callscore").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/callscore/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("callscore"))
        .unwrap_or_else(|| PathBuf::from("./callscore_data"))
}

/// Resolves the root folder following the priority order above
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_value: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            info!(module = %self.module_name, "Root folder from config file: {}", path.display());
            return path.clone();
        }

        let path = default_root_folder();
        info!(module = %self.module_name, "Root folder from compiled default: {}", path.display());
        path
    }
}

/// Creates the root folder and reports where the database lives
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

/// Resolve a secret from environment, then TOML.
///
/// Warns when both sources are set; the environment wins.
pub fn resolve_secret(env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| !v.trim().is_empty());
    let toml_value = toml_value.filter(|v| !v.trim().is_empty());

    match (env_value, toml_value) {
        (Some(env), Some(_)) => {
            warn!("{} set in both environment and config file. Using environment.", env_var);
            Some(env)
        }
        (Some(env), None) => Some(env),
        (None, Some(toml)) => Some(toml.to_string()),
        (None, None) => None,
    }
}
