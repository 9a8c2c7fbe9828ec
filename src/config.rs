// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

use crate::analysis::AnalysisSettings;
use crate::history::DEFAULT_MAX_ENTRIES;

pub const CONFIG_PATH_VAR: &str = "MEDIDASH_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub analysis: AnalysisSettings,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub backend_url: String,
    pub use_local_proxy: bool,
    pub local_proxy_url: String,
    pub timeout_secs: u64,
    pub recaptcha_site_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000".to_string(),
            use_local_proxy: false,
            local_proxy_url: "http://localhost:3001".to_string(),
            timeout_secs: 30,
            recaptcha_site_key: None,
        }
    }
}

impl ApiConfig {
    /// Base URL that requests are sent to.
    pub fn base_url(&self) -> &str {
        if self.use_local_proxy {
            &self.local_proxy_url
        } else {
            &self.backend_url
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: PathBuf,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("medidash_bmi_history.json"),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Config {
    /// Read a YAML config file. Missing sections and fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config `{}`", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config `{}`", path.display()))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// File (explicit path, else `MEDIDASH_CONFIG`, else defaults) followed by
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Config::from_file(&p)?,
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        info!(base_url = config.api.base_url(), "configuration ready");
        Ok(config)
    }

    /// Apply overrides from `lookup`; each variable also has a `VITE_` alias,
    /// the unprefixed name taking precedence.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .or_else(|| lookup(&format!("VITE_{}", name)))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = get("BACKEND_URL") {
            self.api.backend_url = url;
        }
        if let Some(flag) = get("USE_LOCAL_PROXY") {
            self.api.use_local_proxy = parse_flag("USE_LOCAL_PROXY", &flag)?;
        }
        if let Some(url) = get("LOCAL_PROXY_URL") {
            self.api.local_proxy_url = url;
        }
        if let Some(key) = get("RECAPTCHA_SITE_KEY") {
            self.api.recaptcha_site_key = Some(key);
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be true or false, got `{}`", name, other),
    }
}
