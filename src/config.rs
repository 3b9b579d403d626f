// ⚙️ Application configuration - JSON file plus environment overrides

use crate::engine::IntegrationMode;
use crate::page::CompatOptions;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "rental-filter.json";
pub const ENV_API_URL: &str = "RENTAL_FILTER_API_URL";
pub const ENV_MODE: &str = "RENTAL_FILTER_MODE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub reports_path: String,
    pub cars_path: String,
    pub request_timeout_secs: u64,
    pub integration_mode: IntegrationMode,
    pub compat: CompatOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_base_url: "http://localhost:5000".to_string(),
            reports_path: "/reports".to_string(),
            cars_path: "/cars".to_string(),
            request_timeout_secs: 10,
            integration_mode: IntegrationMode::Production,
            compat: CompatOptions::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from `rental-filter.json` when no path is given.
    /// Only the implicit default file may be missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, allow_missing) = match path {
            Some(p) => (p.to_path_buf(), false),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), true),
        };

        let mut config = Self::from_file(&path, allow_missing)?;
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path, allow_missing: bool) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config {:?}", path)),
            Err(e) if e.kind() == ErrorKind::NotFound && allow_missing => Ok(AppConfig::default()),
            Err(e) if e.kind() == ErrorKind::NotFound => bail!("Config file not found: {:?}", path),
            Err(e) => Err(e).with_context(|| format!("Failed to read config {:?}", path)),
        }
    }

    /// Override file values from the environment (`lookup` is `env::var` outside tests)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(mode) = lookup(ENV_MODE) {
            self.integration_mode = match mode.to_lowercase().as_str() {
                "development" | "dev" => IntegrationMode::Development,
                "production" | "prod" => IntegrationMode::Production,
                other => bail!("{} must be 'development' or 'production', got '{}'", ENV_MODE, other),
            };
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
