//! Subscriber setup.
//!
//! Logs go to stderr so the download progress line owns stdout.

use tracing_subscriber::EnvFilter;

/// Default filter, `debug` when `--debug` is given. `RUST_LOG` wins.
pub fn filter_directive(debug: bool) -> &'static str {
    if debug {
        "v2helper=debug,v2helper_cli=debug,info"
    } else {
        "info"
    }
}

/// Install the global fmt subscriber.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}
