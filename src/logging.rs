use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the stderr subscriber. `RUST_LOG` wins over the configured filter.
/// Safe to call more than once; later calls are ignored.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Forwards a webview console line into tracing.
pub fn frontend_log(level: &str, message: &str, context: Option<&str>) {
    let context = context.unwrap_or("");
    match level {
        "error" => tracing::error!(target: "frontend", context, "{}", message),
        "warn" => tracing::warn!(target: "frontend", context, "{}", message),
        "debug" => tracing::debug!(target: "frontend", context, "{}", message),
        _ => tracing::info!(target: "frontend", context, "{}", message),
    }
}
