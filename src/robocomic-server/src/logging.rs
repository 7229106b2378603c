use robocomic_core::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize tracing.
///
/// `RUST_LOG` takes precedence over `level`. JSON lines for production,
/// compact colored output for a dev console.
pub fn init(level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},tower_http=info")));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false).with_target(true))
            .try_init(),
        LogFormat::Human => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false).compact())
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!(?format, "Tracing initialized");
    }
}
