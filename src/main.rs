//! Gmail Bridge
//!
//! Command line entry point: one-time authorization, status, and the web and
//! MCP front ends.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use gmail_bridge::auth::{desktop, Authenticator};
use gmail_bridge::config::Config;
use gmail_bridge::error::Result;
use gmail_bridge::gmail::client::GmailClient;
use gmail_bridge::mcp::server::McpServer;
use gmail_bridge::web::{self, AppState};

/// Gmail Bridge
#[derive(Parser)]
#[command(name = "gmail-bridge")]
#[command(author, version, about = "Gmail Bridge - read and send Gmail from a browser or an MCP client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize Gmail access in the browser (run this first)
    Auth {
        /// Loopback port for the OAuth callback (default: GMAIL_OAUTH_PORT or any free port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the authentication status as JSON
    Status,

    /// Run the web UI
    Web {
        /// Port to listen on (default: PORT or 5000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the MCP tool server
    Mcp {
        #[arg(long, value_enum, default_value_t = Transport::Stdio)]
        transport: Transport,

        /// Port for the HTTP transport (default: MCP_PORT or 8001)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the MCP stdio stream
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;

    match cli.command {
        Some(Commands::Auth { port }) => {
            let authenticator = Authenticator::from_config(&config).await?;
            let Some(manager) = authenticator.token_manager() else {
                eprintln!("Service account mode is active; no interactive authorization is needed.");
                return Ok(());
            };
            desktop::run(manager, port.unwrap_or(config.oauth_callback_port)).await?;
            eprintln!("Authentication completed successfully!");
        }
        Some(Commands::Status) => {
            let gmail = build_client(&config).await?;
            println!("{}", serde_json::to_string_pretty(&gmail.auth_status().await)?);
        }
        Some(Commands::Web { port }) => {
            if let Some(port) = port {
                config.web_port = port;
            }
            let gmail = build_client(&config).await?;
            let state = AppState::new(gmail, config.web_redirect_uri());
            web::serve(state, config.web_port).await?;
        }
        Some(Commands::Mcp { transport, port }) => {
            run_mcp(&config, transport, port.unwrap_or(config.mcp_port)).await?;
        }
        None => {
            run_mcp(&config, Transport::Stdio, config.mcp_port).await?;
        }
    }

    Ok(())
}

async fn build_client(config: &Config) -> Result<Arc<GmailClient>> {
    let authenticator = Authenticator::from_config(config).await?;

    let status = authenticator.status().await;
    if !status.authenticated {
        tracing::warn!(
            "Gmail is not ready ({:?}); run `gmail-bridge auth` or connect from the web UI",
            status.status
        );
    }

    Ok(Arc::new(GmailClient::new(
        Arc::new(authenticator),
        config.api_base_url.clone(),
    )))
}

async fn run_mcp(config: &Config, transport: Transport, port: u16) -> Result<()> {
    let gmail = build_client(config).await?;
    let server = Arc::new(McpServer::new(gmail));

    match transport {
        Transport::Stdio => server.run_stdio().await,
        Transport::Http => server.run_http(port).await,
    }
}
