//! Environment variable configuration support.
//!
//! Used when no config file is present: a full `AppConfig` is assembled from
//! `RCONTAIL_*` variables, with servers enumerated as indexed
//! `RCONTAIL_SERVER_<N>_*` blocks (0-based, stopping at the first gap).

use crate::config::types::*;

/// Check if enough env vars are set to build a config without a file.
pub fn can_build_from_env() -> bool {
    std::env::var("RCONTAIL_SERVER_0_NAME").is_ok()
}

/// Build a complete AppConfig from environment variables.
pub fn build_config_from_env() -> anyhow::Result<AppConfig> {
    let config = AppConfig {
        servers: collect_indexed_servers()?,
        polling: PollingConfig {
            keywords: parse_csv_env("RCONTAIL_LOG_KEYWORDS"),
            cycle_interval_secs: parse_env("RCONTAIL_CYCLE_INTERVAL", 60),
            filter_delay_secs: parse_env("RCONTAIL_FILTER_DELAY", 2),
            backoff_secs: parse_env("RCONTAIL_BACKOFF", 60),
            connect_timeout_secs: parse_env("RCONTAIL_CONNECT_TIMEOUT", 10),
        },
        sinks: SinksConfig {
            database: DatabaseSinkConfig {
                enabled: parse_bool_env("RCONTAIL_SAVE_TO_DB", false),
                url: opt_env("RCONTAIL_DATABASE_URL").unwrap_or_default(),
            },
            file: FileSinkConfig {
                enabled: parse_bool_env("RCONTAIL_SAVE_TO_FILE", false),
                path: opt_env("RCONTAIL_LOG_FILE_PATH")
                    .map(Into::into)
                    .unwrap_or_else(|| "rcon.log".into()),
            },
        },
        logging: LoggingConfig {
            level: opt_env("RCONTAIL_LOG_LEVEL")
                .map(|s| parse_log_level(&s))
                .transpose()?
                .unwrap_or(LogLevel::Info),
            format: opt_env("RCONTAIL_LOG_FORMAT")
                .map(|s| parse_log_format(&s))
                .transpose()?
                .unwrap_or(LogFormat::Pretty),
        },
    };

    Ok(config)
}

/// Collect RCONTAIL_SERVER_<N>_* blocks, stopping at the first index with no
/// NAME variable. An index with NAME but a missing or unparseable companion
/// variable is an error rather than a silent skip.
fn collect_indexed_servers() -> anyhow::Result<Vec<ServerTarget>> {
    let mut servers = Vec::new();
    let mut index = 0;
    loop {
        let prefix = format!("RCONTAIL_SERVER_{index}_");
        let name = match opt_env(&format!("{prefix}NAME")) {
            Some(n) => n,
            None => break,
        };
        let host = require_env(&format!("{prefix}HOST"))?;
        let port_raw = require_env(&format!("{prefix}PORT"))?;
        let port: u16 = port_raw
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid {prefix}PORT: {port_raw}"))?;
        let password = require_env(&format!("{prefix}PASSWORD"))?;

        servers.push(ServerTarget {
            name,
            host,
            port,
            password,
        });
        index += 1;
    }
    Ok(servers)
}

fn opt_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn require_env(key: &str) -> anyhow::Result<String> {
    opt_env(key).ok_or_else(|| anyhow::anyhow!("missing required env var: {key}"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match opt_env(key) {
        Some(raw) => raw.parse().unwrap_or(default),
        None => default,
    }
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    match opt_env(key) {
        Some(raw) => matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

/// Split a comma-separated env var into trimmed, non-empty items.
fn parse_csv_env(key: &str) -> Vec<String> {
    opt_env(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_log_level(raw: &str) -> anyhow::Result<LogLevel> {
    match raw.to_ascii_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        other => anyhow::bail!("invalid log level: {other}"),
    }
}

fn parse_log_format(raw: &str) -> anyhow::Result<LogFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => anyhow::bail!("invalid log format: {other}"),
    }
}
