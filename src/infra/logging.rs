//! tracing subscriber setup shared by every command.
//!
//! Reports go to stdout; everything logged through `tracing` goes to stderr
//! so listings and diffs stay pipeable.

use tracing_subscriber::EnvFilter;

/// Level used when RUST_LOG is unset, chosen by the `--verbose` count
fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global fmt subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
