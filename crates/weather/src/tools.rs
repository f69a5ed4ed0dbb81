//! Tool surface of the weather provider.

use mcp::{CallToolResult, Tool, ToolHandler};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::service::WeatherService;

pub const WEATHER_TOOL: &str = "get_current_weather";

/// Descriptor for the `get_current_weather` tool.
pub fn weather_tool() -> Tool {
    Tool {
        name: WEATHER_TOOL.to_string(),
        description: Some(
            "Get the current weather for a specified city. Returns temperature, humidity, \
             conditions, and more."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "The city name (e.g., 'London', 'San Francisco')",
                },
                "country": {
                    "type": "string",
                    "description": "Optional ISO 3166 country code (e.g., 'US', 'GB', 'FR')",
                },
            },
            "required": ["city"],
        }),
    }
}

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    city: Option<String>,
    country: Option<String>,
}

/// Handler exposing the weather tool over the provider channel.
pub struct WeatherHandler {
    service: WeatherService,
}

impl WeatherHandler {
    pub fn new(service: WeatherService) -> Self {
        Self { service }
    }

    fn parse_args(arguments: Option<Value>) -> Result<(String, Option<String>), String> {
        let args: WeatherArgs = match arguments {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| format!("invalid arguments: {e}"))?,
            None => return Err("missing required parameter: city".to_string()),
        };

        match args.city {
            Some(city) if !city.trim().is_empty() => Ok((city, args.country)),
            _ => Err("missing required parameter: city".to_string()),
        }
    }

    async fn get_current_weather(&self, arguments: Option<Value>) -> CallToolResult {
        let (city, country) = match Self::parse_args(arguments) {
            Ok(parsed) => parsed,
            Err(message) => {
                warn!(%message, "rejecting weather call");
                return CallToolResult::error(json!({ "error": message }).to_string());
            }
        };

        match self.service.current_weather(&city, country.as_deref()).await {
            Ok(report) => {
                info!(%city, "weather report ready");
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => CallToolResult::text(text),
                    Err(e) => CallToolResult::error(
                        json!({ "error": format!("failed to serialize report: {e}") }).to_string(),
                    ),
                }
            }
            Err(e) => {
                warn!(%city, error = %e, "weather lookup failed");
                CallToolResult::error(json!({ "error": e.to_string() }).to_string())
            }
        }
    }
}

impl ToolHandler for WeatherHandler {
    fn tools(&self) -> Vec<Tool> {
        vec![weather_tool()]
    }

    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> CallToolResult {
        match name {
            WEATHER_TOOL => self.get_current_weather(arguments).await,
            other => {
                warn!(tool = other, "unknown tool requested");
                CallToolResult::error(json!({ "error": format!("unknown tool: {other}") }).to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::time::Duration;

    fn handler() -> WeatherHandler {
        WeatherHandler::new(WeatherService::new(Settings {
            api_key: "test".to_string(),
            // Unroutable, so any accidental request fails fast.
            base_url: "http://127.0.0.1:1/data/2.5".to_string(),
            timeout: Duration::from_millis(100),
        }))
    }

    #[test]
    fn descriptor_declares_required_city() {
        let tool = weather_tool();
        assert_eq!(tool.name, WEATHER_TOOL);
        assert!(tool.description.is_some());
        assert_eq!(tool.input_schema["required"][0], "city");
    }

    #[tokio::test]
    async fn missing_city_is_error_result() {
        let result = handler()
            .call_tool(WEATHER_TOOL, Some(json!({"country": "GB"})))
            .await;
        assert!(result.is_error);
        let text = result.content[0].as_text().unwrap();
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["error"], "missing required parameter: city");
    }

    #[tokio::test]
    async fn missing_arguments_is_error_result() {
        let result = handler().call_tool(WEATHER_TOOL, None).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn unknown_tool_is_error_result() {
        let result = handler().call_tool("get_forecast", None).await;
        assert!(result.is_error);
        let text = result.content[0].as_text().unwrap();
        assert!(text.contains("unknown tool"));
    }
}
