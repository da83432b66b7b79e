use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter for a given number of `-v` flags.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "appconfig=info",
        _ => "appconfig=debug",
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr so stdout only carries command output. `RUST_LOG`
/// takes precedence over `verbosity`.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .with_level(true)
        .compact();

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbosity)))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
