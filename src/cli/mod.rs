//! CLI entry point for cortex-agent.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::SessionConfig;
use crate::error::AgentError;

/// Cortex Agent CLI
#[derive(Parser, Debug)]
#[command(
    name = "cortex-agent",
    version,
    about = "Chat with a Snowflake Cortex Agent over key-pair auth"
)]
pub struct Cli {
    /// Read settings from a TOML file instead of the environment
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question, or start an interactive session when no prompt is given
    Chat(ChatArgs),
    /// Mint a token and print its claims
    Token(TokenArgs),
    /// Print the public key fingerprint to register with the user
    Fingerprint,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Override the orchestration model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print raw stream chunks after each turn
    #[arg(long)]
    pub debug_chunks: bool,

    /// User prompt (positional)
    pub prompt: Option<String>,
}

/// Arguments for the `token` subcommand.
#[derive(Parser, Debug)]
pub struct TokenArgs {
    /// Also print the signed token itself
    #[arg(long)]
    pub show_token: bool,
}

impl Cli {
    /// Resolve the session configuration for this invocation.
    pub fn load_config(&self) -> Result<SessionConfig, AgentError> {
        match &self.config {
            Some(path) => SessionConfig::from_toml_file(path),
            None => SessionConfig::from_env(),
        }
    }
}
