use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::api::source::CredentialSource;
use crate::error::ConfigError;
use crate::types::Config;

/// Environment override for the config file location
pub const CONFIG_PATH_ENV: &str = "TPM_INSIGHTS_CONFIG";

/// Environment fallback for the API token
pub const TOKEN_ENV: &str = "TPM_API_TOKEN";

/// Application state shared between the dashboard and its controllers
pub struct AppState {
    config: RwLock<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Snapshot of the current config
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Swap in a reloaded config. Returns true if the API token changed.
    pub fn replace_config(&self, config: Config) -> bool {
        let mut guard = self.config.write();
        let token_changed = guard.api.token != config.api.token;
        *guard = config;
        token_changed
    }
}

impl CredentialSource for AppState {
    fn bearer_token(&self) -> Option<String> {
        let configured = self.config.read().api.token.clone();
        resolve_token(configured, std::env::var(TOKEN_ENV).ok())
    }
}

/// The configured token, else the env token. Blank values count as unset.
fn resolve_token(configured: Option<String>, env: Option<String>) -> Option<String> {
    let non_blank = |token: &String| !token.trim().is_empty();
    configured.filter(non_blank).or_else(|| env.filter(non_blank))
}

/// Resolve the config path: `$TPM_INSIGHTS_CONFIG`, else ~/.tpm-insights/config.json
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".tpm-insights").join("config.json"))
}

/// Load and validate configuration from `path`
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: Config = serde_json::from_str(&content)?;

    // Validate the base URL up front so a typo fails at startup, not per request
    url::Url::parse(&config.api.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
        url: config.api.base_url.clone(),
        reason: e.to_string(),
    })?;

    Ok(config)
}
