use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str =
    "https://maps.nextbike.net/maps/nextbike-live.json?city=1&domains=le&list_cities=0&bikes=0";

/// Electric cargo bikes of the Leipzig fleet
const DEFAULT_TRACKED_BIKES: [&str; 6] = ["20091", "20095", "20096", "20111", "20118", "20119"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// nextbike live feed URL
    pub endpoint: String,
    /// Country name as it appears in `country_name`
    pub country: String,
    /// City name as it appears in the city's `name`
    pub city: String,
    /// Bike numbers to record, matched exactly
    pub tracked_bikes: Vec<String>,
    pub poll_interval_secs: u64,
    /// Total budget for one feed request, connect and body included
    pub request_timeout_secs: u64,
    pub database_path: String,
    /// Run a single poll cycle and exit, for use under cron
    pub oneshot: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            country: "Germany".to_string(),
            city: "Leipzig".to_string(),
            tracked_bikes: DEFAULT_TRACKED_BIKES.iter().map(|b| b.to_string()).collect(),
            poll_interval_secs: 5 * 60,
            request_timeout_secs: 5,
            database_path: "./nextbike.db".to_string(),
            oneshot: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::from_yaml(&content)
    }

    /// Like `load`, but a missing file yields the built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "endpoint",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config value for '{field}': {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}
