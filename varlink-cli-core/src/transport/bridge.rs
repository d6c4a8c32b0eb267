//! Bridge connections.
//!
//! A bridge is any command that speaks Varlink on its stdin/stdout and forwards the
//! conversation to a service somewhere else, e.g. `ssh host varlink bridge` or
//! `podman exec container varlink bridge`. The command line is run through `sh -c`.
use super::Connection;
use std::{io, process::Stdio};
use tokio::process::Command;

/// Spawns `command` and returns a connection over its stdin/stdout.
///
/// The bridge's stderr is inherited so its diagnostics reach the user. The process is
/// killed when the returned connection is dropped.
pub fn spawn(command: &str) -> io::Result<Connection> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::other("bridge stdin was not captured"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("bridge stdout was not captured"))?;

    tracing::debug!(pid = child.id(), "bridge spawned");

    Ok(Connection::from_parts(
        Box::new(stdout),
        Box::new(stdin),
        Some(child),
    ))
}
