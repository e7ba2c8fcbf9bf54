//! Application configuration for DealScope.
//!
//! User config lives at `~/.dealscope/dealscope.toml`. The file holds
//! endpoints and env-var *names*; secrets themselves stay in the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DealScopeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dealscope.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dealscope";

/// Default database file name inside the config directory.
const DB_FILE_NAME: &str = "dealscope.db";

// ---------------------------------------------------------------------------
// Config structs (matching dealscope.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// CRM API settings.
    #[serde(default)]
    pub crm: CrmConfig,

    /// Model analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[crm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Base URL of the CRM REST API.
    #[serde(default = "default_crm_base_url")]
    pub base_url: String,

    /// Name of the env var holding the access token (never the token itself).
    #[serde(default = "default_crm_token_env")]
    pub token_env: String,

    /// Hostname fragment identifying links into the CRM itself, used to
    /// classify URLs found in engagement bodies. App links do not share the
    /// API host, so this is configured separately from `base_url`.
    #[serde(default = "default_internal_host")]
    pub internal_host: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_crm_base_url(),
            token_env: default_crm_token_env(),
            internal_host: default_internal_host(),
        }
    }
}

fn default_crm_base_url() -> String {
    "https://api.hubapi.com".into()
}
fn default_crm_token_env() -> String {
    "CRM_ACCESS_TOKEN".into()
}
fn default_internal_host() -> String {
    "hubspot".into()
}

/// `[analysis]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Base URL of the Anthropic API.
    #[serde(default = "default_analysis_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model to run analyses with.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum response tokens per analysis.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: default_analysis_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_analysis_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    4096
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file path. Defaults to `~/.dealscope/dealscope.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl StorageConfig {
    /// Resolve the database path, falling back to the config directory.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(config_dir()?.join(DB_FILE_NAME)),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dealscope/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DealScopeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dealscope/dealscope.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DealScopeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DealScopeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DealScopeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DealScopeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DealScopeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a required secret from the environment, by variable name.
pub fn require_env(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(DealScopeError::config(format!(
            "required secret not found: set the {var_name} environment variable"
        ))),
    }
}
