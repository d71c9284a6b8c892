mod backend;
mod chat;
mod cli;
mod config;
mod errors;
mod job;
mod questionnaire;
mod state;
mod terminal;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load configuration first (a malformed value is fatal)
    let config = Config::from_env()?;

    // Logs go to stderr so they never interleave with prompts on stdout
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("Starting Stellaris v{}", env!("CARGO_PKG_VERSION"));

    Cli::parse().run(config).await
}
