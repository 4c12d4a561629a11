//! Bootstrap configuration
//!
//! Resolution order for the config file:
//! 1. Command-line argument (highest priority)
//! 2. `CLASSBOARD_CONFIG` environment variable
//! 3. `~/.config/classboard/config.toml` (platform config dir)
//! 4. Compiled defaults (fallback)
//!
//! Secrets and the owner id may also come from the environment, which wins
//! over the TOML file. A missing default config file is not an error; a
//! missing file named explicitly is.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::OwnerId;
use crate::time::{zone_offset, CAMPUS_UTC_OFFSET_MINUTES};
use crate::{Error, Result};

pub const CONFIG_ENV: &str = "CLASSBOARD_CONFIG";
pub const OWNER_ID_ENV: &str = "CLASSBOARD_OWNER_ID";
pub const STORE_URL_ENV: &str = "CLASSBOARD_STORE_URL";
pub const STORE_KEY_ENV: &str = "CLASSBOARD_STORE_KEY";
pub const VISION_API_KEY_ENV: &str = "CLASSBOARD_VISION_API_KEY";

pub const DEFAULT_PORT: u16 = 5730;
pub const DEFAULT_VISION_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_VISION_MODEL: &str = "gemini-1.5-flash";

const MIB: u64 = 1024 * 1024;

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup; the service must restart to pick up changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    pub bind: String,

    /// HTTP server port
    pub port: u16,

    /// Owner used when a request does not name one
    pub owner_id: Option<String>,

    /// Campus timezone as minutes east of UTC
    pub utc_offset_minutes: i32,

    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub vision: VisionConfig,
    pub uploads: UploadLimits,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            owner_id: None,
            utc_offset_minutes: CAMPUS_UTC_OFFSET_MINUTES,
            logging: LoggingConfig::default(),
            store: StoreConfig::default(),
            vision: VisionConfig::default(),
            uploads: UploadLimits::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Which store implementation backs tables and buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Hosted REST service
    #[default]
    Hosted,
    /// Local SQLite file, for development
    Local,
}

/// Hosted store / local database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Project URL of the hosted store
    pub url: Option<String>,
    /// Service key sent with every hosted request
    pub service_key: Option<String>,
    /// SQLite file used by the local backend
    pub database_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Hosted,
            url: None,
            service_key: None,
            database_path: PathBuf::from("classboard.db"),
        }
    }
}

/// Vision model settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Ask the model for schema-constrained JSON output
    pub structured_output: bool,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            api_key: None,
            structured_output: true,
            timeout_secs: 60,
            requests_per_minute: 15,
        }
    }
}

/// Upload size ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    pub schedule_max_bytes: u64,
    pub notes_max_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            schedule_max_bytes: 10 * MIB,
            notes_max_bytes: 25 * MIB,
        }
    }
}

/// Non-empty, non-whitespace secret
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Platform default location of the config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("classboard").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

impl TomlConfig {
    /// Resolve and load the config file, then apply environment overrides
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        let explicit = cli_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                info!("Loading config from {}", path.display());
                load_config(&path)?
            }
            None => match default_config_path().filter(|path| path.exists()) {
                Some(path) => {
                    info!("Loading config from {}", path.display());
                    load_config(&path)?
                }
                None => {
                    warn!("No config file found, using compiled defaults");
                    TomlConfig::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment values win over the file for the owner, store and secrets
    pub fn apply_env_overrides(&mut self) {
        if let Some(owner) = env_value(OWNER_ID_ENV) {
            self.owner_id = Some(owner);
        }
        if let Some(url) = env_value(STORE_URL_ENV) {
            self.store.url = Some(url);
        }
        if let Some(key) = env_value(STORE_KEY_ENV) {
            if self.store.service_key.as_deref().is_some_and(is_valid_key) {
                warn!("Store key found in both environment and TOML, using environment");
            }
            self.store.service_key = Some(key);
        }
        if let Some(key) = env_value(VISION_API_KEY_ENV) {
            if self.vision.api_key.as_deref().is_some_and(is_valid_key) {
                warn!("Vision API key found in both environment and TOML, using environment");
            }
            self.vision.api_key = Some(key);
        }
    }

    /// Default owner for requests that do not name one
    pub fn owner(&self) -> Result<OwnerId> {
        match self.owner_id.as_deref() {
            Some(raw) if is_valid_key(raw) => raw.parse(),
            _ => Err(Error::Config(format!(
                "Owner id not configured. Set owner_id in the config file or {}",
                OWNER_ID_ENV
            ))),
        }
    }

    /// Check everything the service needs before it starts serving
    pub fn validate(&self) -> Result<()> {
        self.owner()?;
        zone_offset(self.utc_offset_minutes)?;

        if self.store.backend == StoreBackend::Hosted {
            if !self.store.url.as_deref().is_some_and(is_valid_key) {
                return Err(Error::Config(format!(
                    "Hosted store URL not configured. Set store.url or {}",
                    STORE_URL_ENV
                )));
            }
            if !self.store.service_key.as_deref().is_some_and(is_valid_key) {
                return Err(Error::Config(format!(
                    "Hosted store key not configured. Set store.service_key or {}",
                    STORE_KEY_ENV
                )));
            }
        }

        if !self.vision.api_key.as_deref().is_some_and(is_valid_key) {
            return Err(Error::Config(format!(
                "Vision API key not configured. Set vision.api_key or {}",
                VISION_API_KEY_ENV
            )));
        }

        if self.vision.requests_per_minute == 0 {
            return Err(Error::Config(
                "vision.requests_per_minute must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| is_valid_key(value))
}
