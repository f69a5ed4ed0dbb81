//! Provider settings, read once from the environment at startup.

use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings for the weather provider.
#[derive(Debug, Clone)]
pub struct Settings {
    /// OpenWeatherMap API key.
    pub api_key: String,
    /// API base URL.
    pub base_url: String,
    /// HTTP request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("OPENWEATHER_API_KEY is not set. Get a key at https://openweathermap.org/api and export it")]
    MissingApiKey,

    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Settings {
    /// Read settings from the environment. Called once at process start;
    /// the result is immutable for the process lifetime.
    pub fn from_env() -> Result<Self, SettingsError> {
        let api_key =
            std::env::var("OPENWEATHER_API_KEY").map_err(|_| SettingsError::MissingApiKey)?;

        let base_url = std::env::var("OPENWEATHER_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout = match std::env::var("VANE_WEATHER_TIMEOUT_SECS") {
            Ok(value) => {
                let secs: u64 = value.parse().map_err(|_| SettingsError::Invalid {
                    name: "VANE_WEATHER_TIMEOUT_SECS",
                    value,
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// The current-weather endpoint URL.
    pub fn weather_url(&self) -> String {
        format!("{}/weather", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_url_joins_base() {
        let settings = Settings {
            api_key: "k".to_string(),
            base_url: "https://example.test/data/2.5".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(settings.weather_url(), "https://example.test/data/2.5/weather");
    }
}
