use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use rcontail::cli::{Cli, Command};
use rcontail::config::{self, types::AppConfig};
use rcontail::logging::setup_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::CheckConfig) => {
            let cfg = load(&cli)?;
            println!("Configuration is valid.");
            println!("  Servers: {}", cfg.servers.len());
            for server in &cfg.servers {
                println!("    {} -> {}:{}", server.name, server.host, server.port);
            }
            let keywords = cfg.polling.effective_keywords();
            println!(
                "  Keywords: {}",
                keywords
                    .iter()
                    .map(|k| if k.is_empty() { "(all)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("  Database sink: {}", cfg.sinks.database.enabled);
            println!("  File sink: {}", cfg.sinks.file.enabled);
            return Ok(());
        }
        Some(Command::HealthCheck {
            host,
            port,
            timeout,
        }) => {
            use std::net::{TcpStream, ToSocketAddrs};
            use std::time::Duration;

            let addr = format!("{}:{}", host, port);
            let resolved = addr
                .to_socket_addrs()
                .ok()
                .and_then(|mut addrs| addrs.next());
            let Some(resolved) = resolved else {
                eprintln!("FAIL: cannot resolve {}", addr);
                std::process::exit(1);
            };
            match TcpStream::connect_timeout(&resolved, Duration::from_secs(*timeout)) {
                Ok(_) => {
                    println!("OK: {} is reachable", addr);
                    return Ok(());
                }
                Err(e) => {
                    eprintln!("FAIL: {} is not reachable: {}", addr, e);
                    std::process::exit(1);
                }
            }
        }
        Some(Command::Init { output }) => {
            if output.exists() {
                anyhow::bail!("refusing to overwrite existing file: {}", output.display());
            }
            std::fs::write(output, config::sample_config())?;
            eprintln!("Configuration written to: {}", output.display());
            eprintln!();
            eprintln!("Edit the server entries, then start with:");
            eprintln!("  rcontail -c {}", output.display());
            return Ok(());
        }
        None => {}
    }

    let cfg = load(&cli)?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| cfg.logging.level.to_string());
    setup_logging(&level, cfg.logging.format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        servers = cfg.servers.len(),
        "Starting rcontail"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Err(e) = rcontail::supervisor::run(cfg).await {
            error!(error = %e, "Collector error");
            std::process::exit(1);
        }
    });

    Ok(())
}

/// Load configuration: the file when it exists, otherwise environment mode.
fn load(cli: &Cli) -> Result<AppConfig> {
    if cli.config.exists() {
        config::load_config(&cli.config)
    } else if config::env::can_build_from_env() {
        let cfg = config::env::build_config_from_env()?;
        config::validate_config(&cfg)?;
        Ok(cfg)
    } else {
        anyhow::bail!(
            "no configuration: {} does not exist and RCONTAIL_SERVER_0_NAME is not set \
             (run `rcontail init` to generate a sample config)",
            cli.config.display()
        )
    }
}
