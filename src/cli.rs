use std::error::Error;
use std::net::SocketAddr;

use assistant_relay::backend::BackendClient;
use assistant_relay::config::RelayConfig;
use assistant_relay::controller::{Controller, RequestState};
use assistant_relay::format::format_response;
use assistant_relay::web;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "assistant-relay",
    about = "Relay prompts to an assistant backend",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit one prompt and print the formatted response.
    Ask {
        /// The prompt text to send.
        prompt: String,
        /// Backend endpoint override (URL or path).
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Serve the prompt form over HTTP.
    Serve {
        /// Address to bind, e.g. 127.0.0.1:8080.
        #[arg(long)]
        addr: Option<SocketAddr>,
        /// Backend endpoint override (URL or path).
        #[arg(long)]
        endpoint: Option<String>,
        /// Public base URL used to resolve a path-only endpoint.
        #[arg(long)]
        base_url: Option<String>,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = RelayConfig::from_env()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Command::Ask { prompt, endpoint } => {
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            runtime.block_on(handle_ask(&config, &prompt, cli.json))
        }
        Command::Serve {
            addr,
            endpoint,
            base_url,
        } => {
            if let Some(addr) = addr {
                config.addr = addr;
            }
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            runtime.block_on(web::serve(config))?;
            Ok(())
        }
    }
}

async fn handle_ask(
    config: &RelayConfig,
    prompt: &str,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let controller = Controller::new(BackendClient::new(config.resolved_endpoint()));
    match controller.submit(prompt).await {
        RequestState::Succeeded(text) => {
            if as_json {
                let payload = json!({ "response": text });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", format_response(&text).to_plain());
            }
            Ok(())
        }
        RequestState::Failed(message) => Err(message.into()),
        RequestState::Loading | RequestState::Idle => {
            Err("request did not settle".into())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assistant_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
