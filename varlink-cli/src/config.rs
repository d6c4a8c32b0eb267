//! # Configuration
//!
//! The settings shared by every command, resolved once from the parsed command line and
//! the environment, then passed by reference into the dispatcher and renderer.
use crate::cli::{Cli, ColorMode};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    /// Bridge command used instead of dialing an address. Never empty.
    pub bridge: Option<String>,
    /// Whether output is colorized.
    pub color: bool,
    /// Whether debug logging is enabled.
    pub debug: bool,
}

impl Configuration {
    /// Builds the configuration from the command line and the value of `$TERM`.
    pub fn from_cli(cli: &Cli, term: Option<&str>) -> Self {
        Self {
            bridge: cli.bridge.clone().filter(|command| !command.is_empty()),
            color: cli.color.enabled(term),
            debug: cli.debug,
        }
    }

    pub fn bridge(&self) -> Option<&str> {
        self.bridge.as_deref()
    }
}

impl ColorMode {
    /// `auto` colorizes only when a terminal type is advertised.
    pub fn enabled(self, term: Option<&str>) -> bool {
        match self {
            ColorMode::On => true,
            ColorMode::Off => false,
            ColorMode::Auto => term.is_some_and(|term| !term.is_empty()),
        }
    }
}
