mod config;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mcp::Provider;
use runtime::{OllamaBackend, Session, ToolExecutor};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

const SYSTEM_PROMPT: &str =
    "You are Vane, a helpful weather assistant. Use the available tools to answer \
     weather questions. Be concise and direct.";
const CONFIG_FILE: &str = "vane.toml";

#[derive(Parser)]
#[command(name = "vane")]
#[command(about = "A local tool-calling weather assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model override (beats config file and environment).
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.backend.model = model;
    }

    println!("vane v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {}", config.backend.model);

    // Connect to the tool provider and discover its tools.
    let provider = Arc::new(Provider::spawn(config.provider_config()).await?);
    if let Err(e) = provider.initialize().await {
        provider.shutdown().await;
        return Err(e.into());
    }

    let descriptors = match provider.list_tools().await {
        Ok(descriptors) => descriptors,
        Err(e) => {
            provider.shutdown().await;
            return Err(e.into());
        }
    };

    if descriptors.is_empty() {
        warn!("no tools discovered from the provider");
        println!("No tools discovered; answering from the model alone.");
    } else {
        println!("Found {} tool(s):", descriptors.len());
        for tool in &descriptors {
            println!(
                "  - {}: {}",
                tool.name,
                tool.description.as_deref().unwrap_or("(no description)")
            );
        }
    }

    let backend = OllamaBackend::builder(&config.backend.model)
        .base_url(&config.backend.base_url)
        .timeout(config.backend_timeout())
        .build();

    let session = match Session::new(backend, ToolExecutor::new(provider.clone()), &descriptors) {
        Ok(session) => session.with_system(SYSTEM_PROMPT),
        Err(e) => {
            provider.shutdown().await;
            return Err(e.into());
        }
    };

    println!("Session ID: {}", session.id);
    println!("Type your weather question ('quit' or Ctrl+D to exit).\n");

    let session = chat_loop(session).await;

    // Teardown always runs, whatever ended the loop.
    session.shutdown().await;
    println!("\nSession ended.");
    Ok(())
}

/// Run the read/answer loop. Always returns the session so the caller can
/// tear it down, whatever ended the loop (EOF, quit, interrupt, I/O error).
async fn chat_loop<B, T>(mut session: Session<B, T>) -> Session<B, T>
where
    B: runtime::LlmBackend,
    T: runtime::ToolDispatch,
{
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        if stdout.write_all(b"> ").await.is_err() || stdout.flush().await.is_err() {
            break;
        }

        let line = tokio::select! {
            line = stdin.next_line() => match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to read input");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                println!("\nInterrupted.");
                break;
            }
        };

        let Some(line) = line else {
            // EOF
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        // A failed query keeps the session alive; the next line retries
        // with history intact.
        match session.chat(input).await {
            Ok(response) => {
                println!("\n{response}\n");
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    session
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => {
            let default_path = std::path::Path::new(CONFIG_FILE);
            if default_path.exists() {
                Ok(Config::load(default_path)?)
            } else {
                Ok(Config::default_config())
            }
        }
    }
}
