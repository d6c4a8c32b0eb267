//! Diagnostic logging.
//!
//! Logs go to stderr so they never mix with the JSON written to stdout. `--debug` raises
//! this tool's own targets to `debug`; `RUST_LOG` overrides everything.
use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";
const DEBUG_FILTER: &str = "warn,varlink=debug,varlink_cli_core=debug";

pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { DEBUG_FILTER } else { DEFAULT_FILTER }));

    // Only fails if a subscriber is already installed, which is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(debug)
        .without_time()
        .try_init();
}
