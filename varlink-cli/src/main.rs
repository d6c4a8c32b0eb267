//! # Varlink CLI Entry Point
//!
//! The main executable of the `varlink` tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and resolves the
//!    shared [`config::Configuration`].
//! 2. **Cancellation**: Installs a Ctrl-C watcher that cancels the in-flight command.
//! 3. **Execution**: Delegates to [`commands::run`], which connects and performs the request.
//! 4. **Presentation**: Prints the result on stdout, or the error on stderr, and exits with
//!    `0` on success, `1` on usage errors and `2` on every other failure.

mod cli;
mod commands;
mod config;
mod formatter;
mod logging;

use clap::{Parser, error::ErrorKind};
use cli::Cli;
use commands::Output;
use config::Configuration;
use formatter::Renderer;
use std::process::ExitCode;
use tracing::debug;
use varlink_cli_core::{CancellationToken, transport::SystemConnector};

const USAGE_ERROR: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return parse_failure(err),
    };

    let config = Configuration::from_cli(&cli, std::env::var("TERM").ok().as_deref());
    logging::init(config.debug);
    colored::control::set_override(config.color);

    let renderer = Renderer::for_color(config.color);
    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone());

    match commands::run(&config, &cli.command, &SystemConnector, &cancel).await {
        Ok(output) => {
            print_output(&renderer, output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", renderer.error(&err));
            if err.is_usage() {
                eprintln!("{}", cli::usage(cli.command.name()));
            }
            ExitCode::from(err.exit_code())
        }
    }
}

/// `--version` is the only early exit that counts as success. Everything else clap
/// reports, `--help` included, is a usage error.
fn parse_failure(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayVersion => {
            print!("{err}");
            ExitCode::SUCCESS
        }
        _ => {
            eprint!("{err}");
            ExitCode::from(USAGE_ERROR)
        }
    }
}

fn watch_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted, cancelling");
            cancel.cancel();
        }
    });
}

fn print_output(renderer: &Renderer, output: Output) {
    match output {
        Output::Info(info) => println!("{}", renderer.info(&info)),
        Output::Description(description) => {
            print!("{description}");
            if !description.ends_with('\n') {
                println!();
            }
        }
        Output::Reply(parameters) => println!("{}", renderer.parameters(&parameters)),
        Output::Sent => {}
    }
}
