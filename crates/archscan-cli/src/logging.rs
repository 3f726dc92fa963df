use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log to stderr so stdout stays clean for JSON output.
///
/// `RUST_LOG` wins over the verbosity flag when set.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();
}
