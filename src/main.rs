//! cortex-agent CLI binary entry point.

use clap::Parser;
use cortex_agent::cli::{commands, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.load_config() {
        Ok(config) => match cli.command {
            Commands::Chat(args) => commands::handle_chat(config, args).await,
            Commands::Token(args) => commands::handle_token(&config, &args),
            Commands::Fingerprint => commands::handle_fingerprint(&config),
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
