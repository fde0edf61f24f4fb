use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{PipelineError, Result};

pub const DEFAULT_BASE_URL: &str = "https://crawl-target-server.vercel.app";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ENV_PREFIX: &str = "CATALOG";

/// Runtime settings: built-in defaults, overridden by `CATALOG_*` env vars,
/// overridden again by CLI flags in `main`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub page_size: u32,
    pub max_pages: Option<u32>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub render_url: String,
    pub ready_selector: String,
    pub navigation_timeout_secs: u64,
    pub ready_timeout_secs: u64,
    pub settle_ms: u64,
    pub snapshot_grace_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            page_size: 10,
            max_pages: None,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.into(),
            render_url: DEFAULT_BASE_URL.into(),
            ready_selector: "h3".into(),
            navigation_timeout_secs: 30,
            ready_timeout_secs: 15,
            settle_ms: 2000,
            snapshot_grace_ms: 5000,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(PipelineError::Config("base url must not be empty".into()));
        }
        if self.page_size == 0 {
            return Err(PipelineError::Config("page size must be at least 1".into()));
        }
        if self.max_pages == Some(0) {
            return Err(PipelineError::Config("page ceiling must be at least 1".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn snapshot_grace(&self) -> Duration {
        Duration::from_millis(self.snapshot_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_without_env() {
        let s = Settings::from_env(env(&[])).unwrap();
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.page_size, 10);
        assert_eq!(s.max_pages, None);
        assert_eq!(s.ready_selector, "h3");
    }

    #[test]
    fn env_overrides_defaults() {
        let s = Settings::from_env(env(&[
            ("CATALOG_BASE_URL", "http://localhost:4000"),
            ("CATALOG_PAGE_SIZE", "25"),
            ("CATALOG_MAX_PAGES", "8"),
        ]))
        .unwrap();
        assert_eq!(s.base_url, "http://localhost:4000");
        assert_eq!(s.page_size, 25);
        assert_eq!(s.max_pages, Some(8));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = Settings::from_env(env(&[("CATALOG_PAGE_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn zero_page_ceiling_is_rejected() {
        let s = Settings {
            max_pages: Some(0),
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(PipelineError::Config(_))));
    }
}
