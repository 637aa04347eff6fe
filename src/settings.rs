use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime settings: `minisite.toml` first, then `MINISITE_*` env overrides.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub database_url: Option<String>,
    pub response_ttl_secs: i64,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            response_ttl_secs: 600,
            user_agent: "minisite/0.1".to_string(),
            request_timeout_secs: 20,
        }
    }
}

impl Settings {
    /// Load from `path`, or from the platform config dir when `path` is None.
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(default_settings_path);
        let mut settings = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(&p).with_context(|| format!("reading {}", p.display()))?;
                Self::from_toml(&raw).with_context(|| format!("parsing {}", p.display()))?
            }
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Self> { Ok(toml::from_str(raw)?) }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("MINISITE_DATABASE_URL").filter(|s| !s.trim().is_empty()) {
            self.database_url = Some(url);
        }
        if let Some(ttl) = lookup("MINISITE_RESPONSE_TTL_SECS").and_then(|s| s.parse().ok()) {
            self.response_ttl_secs = ttl;
        }
        if let Some(ua) = lookup("MINISITE_USER_AGENT").filter(|s| !s.trim().is_empty()) {
            self.user_agent = ua;
        }
        if let Some(t) = lookup("MINISITE_REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.request_timeout_secs = t;
        }
    }

    pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }
}

fn default_settings_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "minisite", "minisite").map(|p| p.config_dir().join("minisite.toml"))
}
