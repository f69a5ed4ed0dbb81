//! OpenWeatherMap API client.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::settings::Settings;

/// Structured current-weather report, as returned to the tool caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    /// Celsius.
    pub temperature: f64,
    /// Celsius.
    pub feels_like: f64,
    /// Percentage.
    pub humidity: u32,
    /// hPa.
    pub pressure: u32,
    pub description: String,
    /// m/s.
    pub wind_speed: f64,
    /// Cloudiness percentage.
    pub clouds: u32,
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("cannot connect to the weather service, check your internet connection")]
    Connect,

    #[error("weather service request timed out, please try again")]
    Timeout,

    #[error("invalid API key, check OPENWEATHER_API_KEY")]
    BadApiKey,

    #[error("location '{0}' not found, check the city name and country code")]
    CityNotFound(String),

    #[error("weather service error: {0}")]
    Api(String),

    #[error("invalid response from the weather service: {0}")]
    InvalidResponse(String),
}

// --- Upstream API response shape ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    name: String,
    sys: ApiSys,
    main: ApiMain,
    weather: Vec<ApiWeather>,
    wind: ApiWind,
    clouds: ApiClouds,
}

#[derive(Debug, Deserialize)]
struct ApiSys {
    country: String,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: f64,
    feels_like: f64,
    humidity: u32,
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct ApiWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ApiWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ApiClouds {
    all: u32,
}

impl ApiResponse {
    fn into_report(self) -> Result<WeatherReport, WeatherError> {
        let description = self
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| WeatherError::InvalidResponse("empty weather array".to_string()))?;

        Ok(WeatherReport {
            city: self.name,
            country: self.sys.country,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            description,
            wind_speed: self.wind.speed,
            clouds: self.clouds.all,
        })
    }
}

/// Client for the OpenWeatherMap current weather API.
pub struct WeatherService {
    client: reqwest::Client,
    settings: Settings,
}

impl WeatherService {
    pub fn new(settings: Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    /// Fetch current weather for a city, optionally scoped by an ISO 3166
    /// country code.
    pub async fn current_weather(
        &self,
        city: &str,
        country: Option<&str>,
    ) -> Result<WeatherReport, WeatherError> {
        let location = match country {
            Some(country) => format!("{city},{country}"),
            None => city.to_string(),
        };
        info!(%location, "fetching current weather");

        let response = self
            .client
            .get(self.settings.weather_url())
            .timeout(self.settings.timeout)
            .query(&[
                ("q", location.as_str()),
                ("appid", self.settings.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "weather request failed");
                if e.is_timeout() {
                    WeatherError::Timeout
                } else if e.is_connect() {
                    WeatherError::Connect
                } else {
                    WeatherError::Api(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "weather service returned error");
            return Err(match status {
                reqwest::StatusCode::UNAUTHORIZED => WeatherError::BadApiKey,
                reqwest::StatusCode::NOT_FOUND => WeatherError::CityNotFound(location),
                _ => WeatherError::Api(body),
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::InvalidResponse(e.to_string()))?;

        let report = api_response.into_report()?;
        debug!(city = %report.city, country = %report.country, "weather report parsed");
        Ok(report)
    }
}
