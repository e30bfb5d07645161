use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber, logging to stderr
///
/// `RUST_LOG` wins when set; otherwise debug builds log at debug level and release
/// builds at info.
pub fn setup_logging() {
    let default_directive = if cfg!(debug_assertions) { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr);
    // Scopes become tracing spans; report their timings on close
    #[cfg(feature = "profiling")]
    let fmt_layer = fmt_layer.with_span_events(fmt::format::FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .init();

    #[cfg(feature = "profiling")]
    tracing::info!("Logging initialized (profiling spans enabled)");
    #[cfg(not(feature = "profiling"))]
    tracing::debug!("Logging initialized");
}
