use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use toolgate_core::{LogSettings, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolgate", about = "Aggregating MCP proxy")]
struct Cli {
    /// Path to the upstream server config (overrides MCP_CONFIG_PATH)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Logs go to stderr (or a file) — stdout carries the MCP transport.
fn init_tracing(log: &LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log.level.to_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);

    match &log.file_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let writer = Arc::new(file);
            if log.show_timestamp {
                builder.with_writer(writer).init();
            } else {
                builder.with_writer(writer).without_time().init();
            }
        }
        None => {
            if log.show_timestamp {
                builder.with_writer(std::io::stderr).init();
            } else {
                builder.with_writer(std::io::stderr).without_time().init();
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(config) = cli.config {
        settings.config_path = config;
    }
    init_tracing(&settings.log)?;

    toolgate_server::run(settings).await?;
    Ok(())
}
