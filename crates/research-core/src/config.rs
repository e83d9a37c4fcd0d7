use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::api::DEFAULT_BASE_URL;
use crate::request::{DEFAULT_POLL_INTERVAL, MAX_POLL_TIME};
use crate::{Credential, ResearchError};

const DEFAULT_CONFIG_PATH: &str = "research.toml";
const CONFIG_PATH_ENV: &str = "TAVILY_RESEARCH_CONFIG";
pub const DEFAULT_API_KEY_ENV: &str = "TAVILY_API_KEY";

/// Top-level configuration structure. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub research: ResearchDefaults,
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the API credential named by `api.api_key_env`.
    pub fn credential(&self) -> Credential {
        Credential::from_env(&self.api.api_key_env)
    }
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument (must exist).
    /// 2. `TAVILY_RESEARCH_CONFIG` environment variable (must exist).
    /// 3. `research.toml` in the current working directory, if present.
    /// 4. Built-in defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Config, ResearchError> {
        let config = match resolve_path(path) {
            Some(candidate) => Self::load_file(&candidate)?,
            None => Config::default(),
        };
        Self::validate(&config)?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Config, ResearchError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| ResearchError::config_io(path.to_path_buf(), err))?;
        toml::from_str(&raw).map_err(|err| ResearchError::InvalidConfiguration(err.to_string()))
    }

    fn validate(config: &Config) -> Result<(), ResearchError> {
        if config.api.api_key_env.trim().is_empty() {
            return Err(ResearchError::InvalidConfiguration(
                "api.api_key_env must reference an environment variable".into(),
            ));
        }
        if config.research.poll_interval_secs == 0 {
            return Err(ResearchError::InvalidConfiguration(
                "research.poll_interval_secs must be at least 1".into(),
            ));
        }
        if config.research.max_poll_secs == 0 {
            return Err(ResearchError::InvalidConfiguration(
                "research.max_poll_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return Some(PathBuf::from(from_env));
        }
    }

    let fallback = Path::new(DEFAULT_CONFIG_PATH);
    fallback.is_file().then(|| fallback.to_path_buf())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

/// Defaults applied when the corresponding CLI flag is omitted.
///
/// `model` and `citation_format` stay as strings so an invalid value is
/// reported by the orchestrator like an invalid flag would be.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResearchDefaults {
    pub model: String,
    pub citation_format: String,
    pub poll_interval_secs: u64,
    pub max_poll_secs: u64,
}

impl Default for ResearchDefaults {
    fn default() -> Self {
        Self {
            model: "mini".to_string(),
            citation_format: "numbered".to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL,
            max_poll_secs: MAX_POLL_TIME,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
}
