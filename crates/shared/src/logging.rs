use std::{env, str::FromStr};

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Output format of the log subscriber, selected with `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr so commands that print tables or JSON on stdout stay clean.
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn configure_logging() -> Result<(), anyhow::Error> {
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_str(filter.as_str())?)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let subscriber = match LogFormat::from_env() {
        LogFormat::Json => subscriber.json().try_init(),
        LogFormat::Text => subscriber.try_init(),
    };

    if let Err(e) = subscriber {
        warn!(
            "Failed to initialize logging, potentially because we have initialized logging already: {}",
            e
        );
    }

    Ok(())
}
