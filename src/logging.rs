use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Honours `RUST_LOG`; defaults to `info` so progress ticks and per-file
/// skips are visible without configuration. Logs go to stderr, keeping
/// stdout free for the encoded task result.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
