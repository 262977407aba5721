use directories::BaseDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{AdminError, Result};

pub const DEFAULT_RECIPIENT_THRESHOLD: usize = 5000;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
    Fallback,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "development" | "dev" => Environment::Development,
            _ => Environment::Fallback,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Fallback => "fallback",
        }
    }

    fn default_api_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://api.freespeek.app/api",
            Environment::Development | Environment::Fallback => "http://localhost:5000/api",
        }
    }

    fn default_asset_url(&self) -> &'static str {
        match self {
            Environment::Production => "https://api.freespeek.app",
            Environment::Development | Environment::Fallback => "http://localhost:5000",
        }
    }
}

/// What gets persisted to `freespeek-admin.toml`. Every field is optional so
/// a partial file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_threshold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_upload_mb: Option<u64>,
}

impl ConfigFile {
    pub fn path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("freespeek-admin.toml"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring unreadable config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => {
                debug!("No config file at {}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path().ok_or_else(|| AdminError::Config("No config dir".into()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| AdminError::Config(e.to_string()))?;
        fs::write(&path, text)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub environment: Environment,
    pub api_url: String,
    pub admin_secret: String,
    pub asset_url: String,
    pub recipient_threshold: usize,
    pub max_upload_bytes: u64,
}

impl AppConfig {
    /// Profile defaults, then the TOML file, then process environment.
    pub fn load() -> Self {
        Self::resolve(ConfigFile::load(), |key| std::env::var(key).ok())
    }

    pub fn resolve<F>(file: ConfigFile, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |keys: &[&str]| keys.iter().find_map(|k| env(k).filter(|v| !v.is_empty()));

        let environment = lookup(&["FREESPEEK_ENV", "NODE_ENV"])
            .or_else(|| file.environment.clone())
            .map(|e| Environment::parse(&e))
            .unwrap_or(Environment::Development);

        let mut api_url = file
            .api_url
            .clone()
            .unwrap_or_else(|| environment.default_api_url().to_string());
        if environment != Environment::Production {
            if let Some(url) = lookup(&["FREESPEEK_API_URL", "REACT_APP_API_URL"]) {
                api_url = url;
            }
        }

        let admin_secret = lookup(&["FREESPEEK_ADMIN_SECRET", "REACT_APP_ADMIN_SECRET"])
            .or_else(|| file.admin_secret.clone())
            .unwrap_or_default();

        let asset_keys: &[&str] = match environment {
            Environment::Production => {
                &["FREESPEEK_BACKEND_URL_PRODUCTION", "REACT_APP_BACKEND_URL_PRODUCTION"]
            }
            _ => &["FREESPEEK_BACKEND_URL_DEVELOPMENT", "REACT_APP_BACKEND_URL_DEVELOPMENT"],
        };
        let asset_url = lookup(asset_keys)
            .or_else(|| file.asset_url.clone())
            .unwrap_or_else(|| environment.default_asset_url().to_string());

        Self {
            environment,
            api_url: crate::utils::normalize_url(&api_url),
            admin_secret,
            asset_url,
            recipient_threshold: file.recipient_threshold.unwrap_or(DEFAULT_RECIPIENT_THRESHOLD),
            max_upload_bytes: file
                .max_upload_mb
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }

    /// Absolute URL for an image referenced by an email template.
    pub fn asset(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.asset_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn masked_secret(&self) -> String {
        match self.admin_secret.chars().count() {
            0 => "(not set)".into(),
            n if n <= 4 => "*".repeat(n),
            n => {
                let head: String = self.admin_secret.chars().take(2).collect();
                format!("{head}{}", "*".repeat(n - 2))
            }
        }
    }
}
