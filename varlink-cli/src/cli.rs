//! # CLI
//!
//! This module defines the command-line interface of `varlink` using `clap`.
//!
//! Positional arguments are optional at this level on purpose: whether a missing address
//! is a usage error or an operational one depends on the command and on `--bridge`, which
//! the dispatcher decides.
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "varlink",
    version,
    about = "Command line client for Varlink services",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use bridge for connection (e.g. 'ssh host varlink bridge')
    #[arg(long, global = true, value_name = "CMD")]
    pub bridge: Option<String>,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print information about a service
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// varlink info unix:/run/org.example.ftl
    /// varlink --bridge "ssh host varlink bridge" info
    /// ```
    Info {
        /// Service address (e.g. unix:/run/org.example.ftl or tcp:127.0.0.1:12345)
        #[arg(value_name = "ADDRESS")]
        address: Option<String>,
    },

    /// Print interface description or service information
    Help {
        /// Interface to describe, optionally prefixed with the service address
        #[arg(value_name = "[ADDRESS/]INTERFACE")]
        interface: Option<String>,
    },

    /// Call a method
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// varlink call unix:/run/org.example.ftl/org.example.ftl.Monitor '{"reset": true}'
    /// ```
    Call {
        /// Do not wait for a reply
        #[arg(long)]
        oneway: bool,

        /// Method to call, optionally prefixed with the service address
        #[arg(value_name = "[ADDRESS/]INTERFACE.METHOD")]
        method: Option<String>,

        /// JSON object with the method parameters
        #[arg(value_name = "ARGUMENTS")]
        parameters: Option<String>,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Info { .. } => "info",
            Commands::Help { .. } => "help",
            Commands::Call { .. } => "call",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    On,
    Off,
    #[default]
    Auto,
}

/// The usage line of `subcommand`, as clap renders it.
pub fn usage(subcommand: &str) -> String {
    let mut command = Cli::command();
    command.build();

    command
        .find_subcommand_mut(subcommand)
        .map(|sub| sub.render_usage().to_string())
        .unwrap_or_else(|| command.render_usage().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("varlink").chain(args.iter().copied()))
    }

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_call_with_global_flags() {
        let cli = parse(&[
            "--bridge",
            "ssh host varlink bridge",
            "--color",
            "off",
            "call",
            "--oneway",
            "org.example.ftl.Reset",
            "{}",
        ])
        .unwrap();

        assert_eq!(cli.bridge.as_deref(), Some("ssh host varlink bridge"));
        assert_eq!(cli.color, ColorMode::Off);
        assert_eq!(
            cli.command,
            Commands::Call {
                oneway: true,
                method: Some("org.example.ftl.Reset".to_string()),
                parameters: Some("{}".to_string()),
            }
        );
    }

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = parse(&["info", "unix:/run/x", "--debug"]).unwrap();

        assert!(cli.debug);
        assert_eq!(cli.color, ColorMode::Auto);
    }

    #[test]
    fn help_is_a_regular_subcommand() {
        let cli = parse(&["help", "unix:/run/x/org.example.ftl"]).unwrap();

        assert_eq!(
            cli.command,
            Commands::Help {
                interface: Some("unix:/run/x/org.example.ftl".to_string())
            }
        );
    }

    #[test]
    fn rejects_unknown_commands_and_modes() {
        assert_eq!(
            parse(&["frobnicate"]).unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
        assert_eq!(
            parse(&["--color", "sometimes", "info"]).unwrap_err().kind(),
            ErrorKind::InvalidValue
        );
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn usage_mentions_the_subcommand() {
        assert!(usage("call").contains("call"));
    }
}
