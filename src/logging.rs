use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::config::types::LogFormat;

/// Initialize the global tracing subscriber.
///
/// `level` accepts anything `EnvFilter` understands ("info",
/// "rcontail=debug,sqlx=warn", ...); invalid directives fall back to "info".
pub fn setup_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Pretty => {
            let ansi = std::io::stdout().is_terminal();
            tracing_subscriber::fmt()
                .with_ansi(ansi)
                .with_env_filter(filter)
                .init();
        }
    }
}
