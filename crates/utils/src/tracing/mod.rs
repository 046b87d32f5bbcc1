use dgrep_core::DGREP_LOG_VAR;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// The filter comes from `DGREP_LOG`, then `RUST_LOG`, then falls back to
/// `debug` when `verbose` is set and `info` otherwise. Logs go to stderr so
/// query reports on stdout stay clean.
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(DGREP_LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(default_level))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(verbose)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span covering one distributed query
pub fn query_span(key: &str, peers: usize) -> Span {
    span!(Level::INFO, "query", key = %key, peers = %peers)
}

/// Create a span covering one inbound peer connection
pub fn connection_span(peer: &str) -> Span {
    span!(Level::INFO, "connection", peer = %peer)
}
