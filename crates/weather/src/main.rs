//! Weather tool provider for Vane.
//!
//! Serves `get_current_weather` over stdio. Logs go to stderr; stdout is the
//! protocol channel.

mod service;
mod settings;
mod tools;

use mcp::ServerInfo;
use tracing::info;
use tracing_subscriber::EnvFilter;

use service::WeatherService;
use settings::Settings;
use tools::WeatherHandler;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    info!(base_url = %settings.base_url, "weather provider starting");

    let handler = WeatherHandler::new(WeatherService::new(settings));

    let info = ServerInfo {
        name: "vane-weather".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    mcp::serve(handler, info).await?;
    Ok(())
}
