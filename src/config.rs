use crate::error::StartupError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_PATH_ENV: &str = "MAPS_API_CONFIG";
pub const BIND_ENV: &str = "MAPS_API_BIND";
pub const DEFAULT_CONFIG_PATH: &str = "maps-api.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub docs: DocsConfig,
    pub localization: LocalizationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Name of the policy applied to every route
    pub policy: String,
    /// Extra policies registered next to the built-in `develop` one
    pub policies: Vec<CorsPolicyConfig>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            policy: crate::cors::DEVELOP_POLICY.to_string(),
            policies: Vec::new(),
        }
    }
}

/// A policy declared in the config file. Omitted lists mean "any".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsPolicyConfig {
    pub name: String,
    pub allowed_origins: Option<Vec<String>>,
    pub allowed_methods: Option<Vec<String>>,
    pub allowed_headers: Option<Vec<String>>,
    pub exposed_headers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    pub enabled: bool,
    /// Directory holding `<crate-name>.xml`; defaults to the executable's directory
    pub comments_dir: Option<PathBuf>,
    pub ui_path: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            comments_dir: None,
            ui_path: "/swagger".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    pub default_culture: String,
    pub supported_cultures: Vec<String>,
    pub resources_dir: Option<PathBuf>,
    pub number_format: NumberFormatOverride,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            default_culture: "en".to_string(),
            supported_cultures: vec!["en".to_string(), "en-US".to_string(), "de-DE".to_string()],
            resources_dir: None,
            number_format: NumberFormatOverride::default(),
        }
    }
}

/// Applied on top of the default culture's built-in number format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormatOverride {
    pub decimal_digits: Option<usize>,
    pub decimal_separator: Option<String>,
    pub group_separator: Option<String>,
}

impl Default for NumberFormatOverride {
    fn default() -> Self {
        Self {
            decimal_digits: Some(0),
            decimal_separator: Some(".".to_string()),
            group_separator: Some(".".to_string()),
        }
    }
}

impl AppConfig {
    /// Loads from `$MAPS_API_CONFIG` (or `maps-api.toml`), then applies env overrides.
    pub fn load() -> Result<Self, StartupError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// `load` with the environment supplied by `var`.
    pub fn load_with(var: impl Fn(&str) -> Option<String>) -> Result<Self, StartupError> {
        let path = var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = Self::from_file(&path)?;
        if let Some(bind) = var(BIND_ENV) {
            config.server.bind = bind;
        }
        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, StartupError> {
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| StartupError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| StartupError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, StartupError> {
        self.server
            .bind
            .parse()
            .map_err(|_| StartupError::InvalidBind(self.server.bind.clone()))
    }
}
