//! Configuration loader and validator for the console API client.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub api: Api,
    pub app: App,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Request timeout in milliseconds; 0 disables it.
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Client-side behaviour shared by every list and form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub login_path: String,
    pub default_page_size: u64,
}

fn default_user_agent() -> String {
    concat!("console-sync/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Config {
    /// Parsed API origin. Always ends in `/` so relative joins keep any path prefix.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let raw = self.api.base_url.trim();
        let with_slash = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        let url = Url::parse(&with_slash)
            .map_err(|_| ConfigError::Invalid("api.base_url must be an absolute URL"))?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::Invalid("api.base_url must be an absolute URL"));
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.api.timeout_ms > 0).then(|| Duration::from_millis(self.api.timeout_ms))
    }

    /// Apply `CONSOLE_API_URL` / `CONSOLE_API_TOKEN` style overrides.
    pub fn apply_overrides(&mut self, base_url: Option<String>, token: Option<String>) {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.api.token = Some(token);
        }
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_overrides(
        std::env::var("CONSOLE_API_URL").ok(),
        std::env::var("CONSOLE_API_TOKEN").ok(),
    );
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.api.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.base_url must be non-empty"));
    }
    cfg.base_url()?;
    if cfg.api.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("api.user_agent must be non-empty"));
    }
    if !cfg.app.login_path.starts_with('/') {
        return Err(ConfigError::Invalid("app.login_path must start with '/'"));
    }
    if cfg.app.default_page_size == 0 {
        return Err(ConfigError::Invalid("app.default_page_size must be > 0"));
    }
    Ok(())
}

/// Sample configuration printed by `console-sync config-example`.
pub fn example() -> &'static str {
    r#"api:
  base_url: "http://localhost:5000/"
  token: null
  timeout_ms: 30000
  user_agent: "console-sync/0.1"

app:
  login_path: "/login"
  default_page_size: 10
"#
}
