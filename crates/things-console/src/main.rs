mod console;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use things_client::{AlertBus, ApiClient, MessageChannel};
use things_proto::config::Config;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::console::{Console, Request};

/// Console client for a spotifythings server.
#[derive(Debug, Parser)]
#[command(name = "thingsctl", version)]
struct Args {
    /// Server host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(long)]
    log_stderr: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Allow RUST_LOG override of the configured filter.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log.filter.clone());
    if args.log_stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(log_filter.as_str())
            .init();
    } else {
        let log_path = things_proto::platform::log_file();
        if let Some(dir) = log_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_env_filter(log_filter.as_str())
            .with_ansi(false)
            .init();
        eprintln!("thingsctl log: {}", log_path.display());
    }

    tracing::info!("thingsctl starting, server {}", config.server.authority());

    let channel = MessageChannel::new(AlertBus::new());
    let api = ApiClient::new(config.server.http_base());
    let mut console = Console::new(Arc::clone(&channel), api, &config);

    let url = config.server.ws_url("/ws/app");
    if let Err(e) = channel.connect(&url).await {
        // Already raised on the alert bus; HTTP commands still work.
        tracing::warn!("could not connect to {}: {}", url, e);
    }

    let mut stdout = std::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request = match line.parse::<Request>() {
            Ok(request) => request,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        match console.execute(request, &mut stdout).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("error: {:#}", e),
        }
    }

    console.shutdown();
    channel.disconnect();
    tracing::info!("thingsctl exiting");
    Ok(())
}
