//! Logging to the javascript console.

use tracing_subscriber::{EnvFilter, prelude::*};
use tracing_web::MakeWebConsoleWriter;

/// Cache and hook events at debug, everything else only on error.
pub const DEFAULT_DIRECTIVES: &str = "error,ui=debug";

pub fn init_logging() {
    init_logging_with(DEFAULT_DIRECTIVES);
}

/// Install the console subscriber with custom filter directives. Calling
/// it again once a subscriber is installed does nothing.
pub fn init_logging_with(directives: &str) {
    let env_filter = EnvFilter::new(directives);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time() // no std::time in the browser
        .with_target(true)
        .with_writer(MakeWebConsoleWriter::new().with_pretty_level())
        .with_level(false);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!(directives, "Console logging ready");
    }
}
