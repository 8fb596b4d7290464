use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod assembler;
mod checklist;
mod client;
mod config;
mod demux;
mod domain;
mod framing;
mod relay;
mod report;
mod run_state;
mod server;
mod upload;

use config::RelayConfig;

/// Precheck - compliance pre-checks for PDF filings, judged by a streaming LLM
#[derive(Parser)]
#[command(name = "precheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Checklist JSON file (defaults to the built-in checklist)
    #[arg(long, global = true)]
    checks: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = config::DEFAULT_LISTEN_ADDR)]
        listen: String,

        /// Upstream API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Upstream API base URL
        #[arg(long, env = "OPENAI_BASE_URL", default_value = config::DEFAULT_BASE_URL)]
        base_url: String,

        /// Chat model
        #[arg(short = 'm', long, env = "OPENAI_MODEL", default_value = config::DEFAULT_MODEL)]
        model: String,

        /// Sampling temperature
        #[arg(long, default_value_t = config::DEFAULT_TEMPERATURE)]
        temperature: f32,
    },
    /// Submit PDF files to a relay and print the verdicts
    Run {
        /// Relay base URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,

        /// Print the final state as JSON
        #[arg(long)]
        json: bool,

        /// PDF files to check
        files: Vec<PathBuf>,
    },
    /// Print the configured checklist
    Checks,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let checks = checklist::load_checklist(cli.checks.as_deref())?;

    match cli.command {
        Commands::Serve {
            listen,
            api_key,
            base_url,
            model,
            temperature,
        } => {
            let config = RelayConfig::new(api_key, &base_url, model, temperature)?;
            run_server(&listen, config, checks).await?;
        }
        Commands::Run {
            server,
            json,
            files,
        } => {
            run_client(&server, json, &files, checks).await?;
        }
        Commands::Checks => {
            for check in &checks {
                println!("{}  {}", check.id, check.name);
                println!("    {}", check.description);
            }
        }
    }

    Ok(())
}

async fn run_server(listen: &str, config: RelayConfig, checks: Vec<domain::Check>) -> Result<()> {
    if config.api_key.is_none() {
        warn!(
            "{} is not set; runs will be rejected until it is configured",
            config::API_KEY_ENV
        );
    }

    let chat = api::ChatClient::new(&config)?;
    info!("Upstream endpoint: {}", chat.endpoint());
    info!("Model: {}", config.model);

    let app = server::router(server::AppState::new(chat, checks));

    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", listen))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn run_client(
    server_url: &str,
    json: bool,
    paths: &[PathBuf],
    checks: Vec<domain::Check>,
) -> Result<()> {
    let mut queue = upload::UploadQueue::new();
    for err in queue.add_paths(paths) {
        eprintln!("⚠️  {}", err);
    }
    for file in queue.files() {
        debug!("Queued {} as {} ({} bytes)", file.name, file.id, file.bytes.len());
    }
    if !queue.is_empty() {
        info!("{} file(s) ready", queue.len());
    }

    let client = client::PrecheckClient::new(server_url)?;
    info!("Relay endpoint: {}", client.endpoint());
    let mut session = client::CheckSession::new(client, checks);
    session.start(queue.encode_all()).await?;
    let state = session.wait().await;

    if json {
        let report = report::RunReport::from_state(&state);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::render_text(&state));
    }

    if let Some(error) = state.error() {
        anyhow::bail!("Run failed: {}", error);
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
