use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,voxdub=debug,voxdub_server=debug,tower_http=info";

/// Configuration for tracing initialization.
pub struct TracingConfig {
    pub json_format: bool,
}

impl TracingConfig {
    /// JSON output when the config asks for it or `LOG_FORMAT=json`.
    pub fn from_settings(json: bool) -> Self {
        let env_json = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        Self {
            json_format: json || env_json,
        }
    }
}

/// Installs the global subscriber and routes `log` records from the core
/// crate into it.
pub fn init_tracing(config: &TracingConfig) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge already installed: {e}");
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {e}");
    }
}
