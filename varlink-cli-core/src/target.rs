//! # Target Resolution
//!
//! Turns the positional argument of a command into a [`Target`] (where to connect) and,
//! for `help` and `call`, a [`MethodReference`] (what to ask the service for).
//!
//! When a bridge command is configured the argument is never parsed as an address: the
//! bridge decides where the service lives and the argument is the reference as-is.
//! Otherwise the argument is an `ADDRESS/INTERFACE[.METHOD]` URI split on its **last** `/`,
//! so addresses may themselves contain slashes (`unix:/run/org.example.ftl/org.example.ftl.Monitor`).
use std::fmt;

/// Errors raised while resolving a command line argument.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Missing [ADDRESS/]INTERFACE.METHOD argument")]
    MissingArgument,
    #[error("No ADDRESS or bridge given")]
    MissingTarget,
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),
}

/// Where to find the service for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Dial the service at `address` (e.g. `unix:/run/org.example.ftl`).
    Direct { address: String },
    /// Spawn `command` and talk to the service through its stdin/stdout.
    Bridged { command: String },
}

impl Target {
    /// Resolves the target of an `info` command.
    ///
    /// The whole argument is the address; there is no interface to split off.
    pub fn for_service(address: Option<&str>, bridge: Option<&str>) -> Result<Self, ResolveError> {
        if let Some(command) = non_empty(bridge) {
            return Ok(Target::Bridged {
                command: command.to_string(),
            });
        }

        non_empty(address)
            .map(|address| Target::Direct {
                address: address.to_string(),
            })
            .ok_or(ResolveError::MissingTarget)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Direct { address } => f.write_str(address),
            Target::Bridged { command } => write!(f, "bridge:{command}"),
        }
    }
}

/// The dotted name sent to the service: `INTERFACE` for `help`, `INTERFACE.METHOD` for `call`.
///
/// The value is passed through untouched, an empty reference included. The service is
/// the authority on whether a name is valid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodReference(String);

impl MethodReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MethodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved `[ADDRESS/]REFERENCE` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub target: Target,
    pub reference: MethodReference,
}

/// Resolves the argument of a `help` command (`[ADDRESS/]INTERFACE`).
pub fn resolve_interface(
    argument: Option<&str>,
    bridge: Option<&str>,
) -> Result<Resolved, ResolveError> {
    resolve(argument, bridge, ResolveError::MissingTarget)
}

/// Resolves the argument of a `call` command (`[ADDRESS/]INTERFACE.METHOD`).
pub fn resolve_method(
    argument: Option<&str>,
    bridge: Option<&str>,
) -> Result<Resolved, ResolveError> {
    resolve(argument, bridge, ResolveError::MissingArgument)
}

fn resolve(
    argument: Option<&str>,
    bridge: Option<&str>,
    missing: ResolveError,
) -> Result<Resolved, ResolveError> {
    if let Some(command) = non_empty(bridge) {
        return Ok(Resolved {
            target: Target::Bridged {
                command: command.to_string(),
            },
            reference: MethodReference::new(argument.unwrap_or_default()),
        });
    }

    let uri = non_empty(argument).ok_or(missing)?;

    let (address, reference) = uri
        .rsplit_once('/')
        .ok_or_else(|| ResolveError::InvalidAddress(uri.to_string()))?;

    Ok(Resolved {
        target: Target::Direct {
            address: address.to_string(),
        },
        reference: MethodReference::new(reference),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
