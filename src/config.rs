use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the playlist API. The BEATSAVER_API_BASE env var wins over this.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    // Applies to every GET and POST made by the client
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    // session-cookie helper
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,
    #[serde(default = "default_cookie_domain")]
    pub cookie_domain: String,
}

fn default_api_base() -> String { "https://api.beatsaver.com".into() }
fn default_batch_size() -> usize { 100 }
fn default_request_timeout() -> u64 { 60 }
fn default_user_agent() -> String {
    format!("beatsaver-playlist-batch/{}", env!("CARGO_PKG_VERSION"))
}
fn default_session_cookie_name() -> String { "BMSESSIONID".into() }
fn default_cookie_domain() -> String { "beatsaver.com".into() }

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("beatsaver-playlist-batch")
        .join("logs")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            batch_size: default_batch_size(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
            log_dir: default_log_dir(),
            session_cookie_name: default_session_cookie_name(),
            cookie_domain: default_cookie_domain(),
        }
    }
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `path` when it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be greater than zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be greater than zero"));
        }
        url::Url::parse(&self.api_base)
            .map_err(|e| anyhow!("api_base '{}' is not a valid URL: {}", self.api_base, e))?;
        if self.session_cookie_name.trim().is_empty() {
            return Err(anyhow!("session_cookie_name must not be empty"));
        }
        Ok(())
    }

    /// Effective API base: env override first, then config. Trailing slashes are dropped.
    pub fn effective_api_base(&self) -> String {
        let base = std::env::var("BEATSAVER_API_BASE").unwrap_or_else(|_| self.api_base.clone());
        base.trim_end_matches('/').to_string()
    }
}
