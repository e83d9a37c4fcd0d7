use std::sync::OnceLock;

use tracing_subscriber::{fmt, EnvFilter};

use crate::ResearchError;

static TELEMETRY_GUARD: OnceLock<()> = OnceLock::new();

const DEFAULT_FILTER: &str = "warn";

/// Configuration options when initialising telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub env_filter: Option<String>,
    pub with_ansi: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            env_filter: None,
            with_ansi: true,
        }
    }
}

/// Initialise the global tracing subscriber on stderr.
///
/// `RUST_LOG` takes precedence over `options.env_filter`. Safe to call multiple
/// times; only the first invocation installs the subscriber.
pub fn init_telemetry(options: TelemetryOptions) -> Result<(), ResearchError> {
    if TELEMETRY_GUARD.get().is_some() {
        return Ok(());
    }

    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or(options.env_filter)
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());

    fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_ansi(options.with_ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| {
            ResearchError::InvalidConfiguration(format!("telemetry init failed: {err}"))
        })?;

    TELEMETRY_GUARD.get_or_init(|| ());
    Ok(())
}
