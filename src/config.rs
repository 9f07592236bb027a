use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result, anyhow};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const BACKEND_URL_ENV: &str = "RELAY_CHAT_BACKEND_URL";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub backend_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load from the user config directory. A missing file is not an error.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Base URL by precedence: explicit flag, environment, config file,
    /// built-in default. Trailing slashes are dropped.
    pub fn resolve_backend_url(&self, flag: Option<&str>, env: Option<&str>) -> String {
        let url = non_blank(flag)
            .or_else(|| non_blank(env))
            .or_else(|| non_blank(self.backend_base_url.as_deref()))
            .unwrap_or(DEFAULT_BACKEND_URL);
        url.trim_end_matches('/').to_string()
    }

    /// A value of 0 from either source counts as unset.
    pub fn request_timeout(&self, flag: Option<u64>) -> Duration {
        let positive = |secs: &u64| *secs > 0;
        Duration::from_secs(
            flag.filter(positive)
                .or(self.request_timeout_secs.filter(positive))
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("relay-chat").join("config.json"))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
