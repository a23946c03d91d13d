mod defaults;


use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ReverieError;
use defaults::*;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "REVERIE_CONFIG";

/// Secrets that may be supplied through the environment instead of the file.
const ENV_MODEL_API_KEY: &str = "REVERIE_MODEL_API_KEY";
const ENV_MATRIX_PASSWORD: &str = "REVERIE_MATRIX_PASSWORD";
const ENV_WEB_API_KEY: &str = "REVERIE_WEB_API_KEY";

/// Top-level Reverie configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub web: WebConfig,
    /// File the config was read from; `None` when running on defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds of inactivity before the default wake-up fires.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Wake scheduler polling cadence.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            idle_timeout_secs: default_idle_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Where plugin packages are discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugin root for installed deployments.
    #[serde(default = "default_plugin_root")]
    pub root: String,
    /// Plugin root used with `--dev-mode` (relative to the working directory).
    #[serde(default = "default_plugin_dev_root")]
    pub dev_root: String,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            root: default_plugin_root(),
            dev_root: default_plugin_dev_root(),
        }
    }
}

impl PluginsConfig {
    /// Resolve the root to scan for the given mode.
    pub fn root_for(&self, dev_mode: bool) -> PathBuf {
        let raw = if dev_mode { &self.dev_root } else { &self.root };
        PathBuf::from(shellexpand(raw))
    }
}

/// Chat-completions model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Full URL of the chat completions endpoint.
    #[serde(default = "default_model_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model_name")]
    pub model: String,
    /// How many remembered messages are sent along with each prompt.
    #[serde(default = "default_context_messages")]
    pub context_messages: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: default_model_api_url(),
            api_key: String::new(),
            model: default_model_name(),
            context_messages: default_context_messages(),
        }
    }
}

/// Behavior of the bundled model-driven bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Consecutive unparseable model replies tolerated before the bot goes quiet.
    #[serde(default = "default_max_invalid_replies")]
    pub max_invalid_replies: u32,
    /// Progress log cadence while dreaming.
    #[serde(default = "default_dream_log_secs")]
    pub dream_log_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            max_invalid_replies: default_max_invalid_replies(),
            dream_log_secs: default_dream_log_secs(),
        }
    }
}

/// Matrix chat backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Homeserver base URL.
    #[serde(default = "default_matrix_server")]
    pub server: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            server: default_matrix_server(),
            user_name: String::new(),
            password: String::new(),
        }
    }
}

impl MatrixConfig {
    pub fn has_credentials(&self) -> bool {
        !self.server.is_empty() && !self.user_name.is_empty() && !self.password.is_empty()
    }
}

/// Web front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// Bearer token required outside dev mode. Empty = every request is rejected.
    #[serde(default)]
    pub api_key: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            api_key: String::new(),
        }
    }
}

impl Config {
    /// Apply secret overrides from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_MODEL_API_KEY).filter(|v| !v.is_empty()) {
            self.model.api_key = key;
        }
        if let Some(password) = lookup(ENV_MATRIX_PASSWORD).filter(|v| !v.is_empty()) {
            self.matrix.password = password;
        }
        if let Some(key) = lookup(ENV_WEB_API_KEY).filter(|v| !v.is_empty()) {
            self.web.api_key = key;
        }
    }

    /// Expanded data directory.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand(&self.agent.data_dir))
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Config path from `REVERIE_CONFIG`, falling back to `config.toml`.
pub fn default_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string())
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist, leaving `source` unset.
/// Environment overrides are applied either way.
pub fn load(path: &str) -> Result<Config, ReverieError> {
    let mut config = read(Path::new(path))?;
    config.apply_env_overrides();
    Ok(config)
}

fn read(path: &Path) -> Result<Config, ReverieError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ReverieError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let mut config: Config = toml::from_str(&content)
        .map_err(|e| ReverieError::Config(format!("failed to parse config: {}", e)))?;
    config.source = Some(path.to_path_buf());
    Ok(config)
}
