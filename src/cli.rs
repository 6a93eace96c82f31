use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rcontail",
    version,
    about = "Resilient RCON log collector for dedicated game servers"
)]
pub struct Cli {
    /// Path to configuration file (also settable via RCONTAIL_CONFIG env var)
    #[arg(short, long, default_value = "rcontail.toml", env = "RCONTAIL_CONFIG")]
    pub config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate configuration and print a summary
    CheckConfig,
    /// Verify one game server is reachable via TCP connect
    HealthCheck {
        /// Server hostname or IP
        #[arg(long)]
        host: String,
        /// RCON port
        #[arg(long)]
        port: u16,
        /// Timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
    /// Write a commented sample configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "rcontail.toml")]
        output: PathBuf,
    },
}
