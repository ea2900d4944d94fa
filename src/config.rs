use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const CONFIG_PATH_ENV: &str = "VITALBOARD_CONFIG";
pub const BASE_URL_ENV: &str = "VITALBOARD_FHIR_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "https://hapi.fhir.org/baseR4";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fhir: FhirConfig,
    pub api: ApiConfig,
    pub drift: DriftConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FhirConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub search_count: u32,       // _count for patient search
    pub observation_count: u32,  // _count for the vital-signs bundle
}

impl Default for FhirConfig {
    fn default() -> Self {
        FhirConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 15,
            search_count: 10,
            observation_count: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub interval_ms: u64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        DriftConfig { interval_ms: 2000 }
    }
}

impl DriftConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fhir.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("fhir.base_url is empty".to_string()));
        }
        if self.fhir.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fhir.timeout_secs must be positive".to_string()));
        }
        if self.drift.interval_ms == 0 {
            return Err(ConfigError::Invalid("drift.interval_ms must be positive".to_string()));
        }
        Ok(())
    }

    fn apply_base_url_override(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|url| !url.trim().is_empty()) {
            self.fhir.base_url = url.trim().to_string();
        }
    }
}

pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, falling back to defaults when it does
/// not exist. `VITALBOARD_FHIR_BASE_URL` overrides the server base URL.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut config = match fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str(&contents)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("No config at {}, using defaults", path.display());
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    config.apply_base_url_override(std::env::var(BASE_URL_ENV).ok());
    config.validate()?;
    Ok(config)
}
