use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
}

impl ProviderConfig {
    fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }
}

fn default_cbr_json() -> ProviderConfig {
    ProviderConfig::new("https://www.cbr-xml-daily.ru")
}

fn default_cbr_xml() -> ProviderConfig {
    ProviderConfig::new("https://www.cbr.ru")
}

fn default_nominatim() -> ProviderConfig {
    ProviderConfig::new("https://nominatim.openstreetmap.org")
}

fn default_open_meteo_geocoding() -> ProviderConfig {
    ProviderConfig::new("https://geocoding-api.open-meteo.com")
}

fn default_open_meteo_timezone() -> ProviderConfig {
    ProviderConfig::new("https://api.open-meteo.com")
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    /// Primary rate feed (JSON).
    #[serde(default = "default_cbr_json")]
    pub cbr_json: ProviderConfig,
    /// Secondary rate feed (XML).
    #[serde(default = "default_cbr_xml")]
    pub cbr_xml: ProviderConfig,
    #[serde(default = "default_nominatim")]
    pub nominatim: ProviderConfig,
    #[serde(default = "default_open_meteo_geocoding")]
    pub open_meteo_geocoding: ProviderConfig,
    #[serde(default = "default_open_meteo_timezone")]
    pub open_meteo_timezone: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            cbr_json: default_cbr_json(),
            cbr_xml: default_cbr_xml(),
            nominatim: default_nominatim(),
            open_meteo_geocoding: default_open_meteo_geocoding(),
            open_meteo_timezone: default_open_meteo_timezone(),
        }
    }
}

fn default_telegram_base_url() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_telegram_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Notifications go to the console when absent.
    pub telegram: Option<TelegramConfig>,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fxnotify", "fxnotify")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "fxnotify", "fxnotify")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
