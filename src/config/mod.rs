//! Configuration module for the mockup service

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub generation: GenerationSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub uploads: UploadSettings,
    #[serde(default)]
    pub sessions: SessionSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Image generation backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    /// Backend code ("gemini" or "dry_run")
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    /// Per-request HTTP timeout for the backend
    pub timeout_secs: u64,
    pub rate_limit_per_minute: u32,
}

/// Product catalog source
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSettings {
    /// JSON file replacing the built-in catalog
    pub path: Option<PathBuf>,
}

/// Logo upload limits
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    pub max_logo_bytes: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        UploadSettings {
            max_logo_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Live session limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Creating a session past this count fails with 503
    pub max_sessions: usize,
    /// Sessions untouched for this long are dropped by the sweeper
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            max_sessions: 1000,
            idle_ttl_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with MOCKUP_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let defaults = Settings::default();

        let builder = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port)?
            .set_default("generation.provider", defaults.generation.provider)?
            .set_default("generation.model", defaults.generation.model)?
            .set_default("generation.base_url", defaults.generation.base_url)?
            .set_default("generation.timeout_secs", defaults.generation.timeout_secs)?
            .set_default(
                "generation.rate_limit_per_minute",
                defaults.generation.rate_limit_per_minute,
            )?
            .set_default("uploads.max_logo_bytes", defaults.uploads.max_logo_bytes as u64)?
            .set_default("sessions.max_sessions", defaults.sessions.max_sessions as u64)?
            .set_default("sessions.idle_ttl_secs", defaults.sessions.idle_ttl_secs)?
            .set_default("sessions.sweep_interval_secs", defaults.sessions.sweep_interval_secs)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local overrides (gitignored)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables (MOCKUP_GENERATION__API_KEY, etc.)
            .add_source(
                Environment::with_prefix("MOCKUP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
            );

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if settings.generation.api_key.as_deref().map_or(true, str::is_empty) {
            settings.generation.api_key = ["GEMINI_API_KEY", "API_KEY"]
                .iter()
                .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
        }

        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: None,
            },
            generation: GenerationSettings {
                provider: "gemini".to_string(),
                model: "gemini-2.5-flash-image".to_string(),
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                timeout_secs: 120,
                rate_limit_per_minute: 30,
            },
            catalog: CatalogSettings::default(),
            uploads: UploadSettings::default(),
            sessions: SessionSettings::default(),
        }
    }
}
