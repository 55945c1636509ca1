//! agent-chat
//!
//! `serve` runs the completion service; `chat` talks to an agent in the
//! terminal through the configured provider.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_chat::agent::Agent;
use agent_chat::config::{Config, PresetManager};
use agent_chat::core::SessionStore;
use agent_chat::providers::Provider;
use agent_chat::{repl, routes, AppState};

#[derive(Parser)]
#[command(name = "agent-chat", version, about = "Chat with configurable AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP completion service (default)
    Serve,

    /// Chat with an agent in the terminal
    Chat {
        /// Preset key: a built-in preset or a file in the presets directory
        #[arg(long, default_value = "math_tutor", conflicts_with = "name")]
        preset: String,

        /// Agent name for an ad-hoc agent
        #[arg(long, requires = "system_prompt")]
        name: Option<String>,

        /// System prompt for an ad-hoc agent
        #[arg(long, requires = "name")]
        system_prompt: Option<String>,

        #[arg(long, env = "AGENT_CHAT_PRESETS_DIR", default_value = "./configs/agents")]
        presets_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            init_tracing("agent_chat=debug,tower_http=debug", false);
            serve(config).await
        }
        Command::Chat {
            preset,
            name,
            system_prompt,
            presets_dir,
        } => {
            init_tracing("agent_chat=warn", true);

            let agent = match (name, system_prompt) {
                (Some(name), Some(system_prompt)) => Agent::create(&name, &system_prompt)?,
                _ => {
                    let mut presets = PresetManager::new(presets_dir);
                    presets.load(&preset).await?.to_agent()?
                }
            };

            let provider = Provider::from_config(&config)?;
            tracing::info!(agent = %agent.name, provider = provider.name(), "starting chat");

            let store = SessionStore::for_agent(&agent, provider);
            repl::run(store, &agent.name).await
        }
    }
}

fn init_tracing(default_filter: &str, to_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if to_stderr {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let provider = Provider::from_config(&config)?;
    tracing::info!(provider = provider.name(), "completion provider ready");

    let state = AppState::new(Arc::new(provider));

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("agent-chat API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
