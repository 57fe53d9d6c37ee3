use anyhow::{bail, Result};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("Invalid log format '{other}'. Use pretty or json."),
        }
    }
}

/// Installs the global subscriber; `RUST_LOG` overrides the `info` default.
///
/// Returns false when a subscriber was already installed (tests, embedding hosts).
pub fn init(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = match format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer().json()).try_init()
        }
        LogFormat::Pretty => tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).try_init(),
    };
    installed.is_ok()
}
