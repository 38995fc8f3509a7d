use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "llm-gateway")]
#[command(about = "OpenAI-compatible LLM gateway: caching, rate limiting, and realtime transcription proxying")]
pub struct Cli {
    /// Path to a YAML config file (`server.* / auth.* / providers.* / cache.* / logging.* / realtime.*`).
    #[arg(short, long, global = true, env = "GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway (the default when no subcommand is given).
    Serve,
    /// Load and validate configuration, then exit without binding.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Parse the config file plus env overrides and report validation errors.
    Check,
}
