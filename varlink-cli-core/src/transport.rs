//! # Transport
//!
//! The opaque [`Connection`] the rest of the crate talks through, and the [`Connector`]
//! seam that establishes it from a [`Target`].
//!
//! A connection is a pair of byte streams carrying NUL-terminated JSON documents (see
//! [`framing`]). Where the bytes come from does not matter past this module:
//!
//! * [`address`]: a `unix:` or `tcp:` socket dialed directly.
//! * [`bridge`]: the stdin/stdout of a spawned bridge command.
//! * [`Connection::from_io`]: any in-memory duplex, used by tests.
//!
//! Dropping a [`Connection`] releases everything it owns: sockets are closed and a bridge
//! process is killed. [`Connection::close`] lets a bridge finish its work first.
pub mod address;
pub mod bridge;
pub mod framing;

use crate::{CancellationToken, cancellable, target::Target};
use address::DialError;
use std::{future::Future, io};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    process::Child,
};
use tracing::debug;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Errors that can occur while establishing a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("No ADDRESS or bridge given")]
    MissingTarget,
    #[error("Cannot connect to '{address}': {source}")]
    Dial {
        address: String,
        #[source]
        source: DialError,
    },
    #[error("Cannot connect with bridge '{command}': {source}")]
    Bridge {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Connection attempt cancelled")]
    Cancelled,
}

/// Errors that can occur while exchanging messages over an established connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Connection closed by the service")]
    ConnectionClosed,
    #[error("Connection closed in the middle of a message")]
    Truncated,
    #[error("Message exceeds the maximum size of {0} bytes")]
    FrameTooLarge(usize),
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Decode(#[from] crate::protocol::DecodeError),
    #[error("Operation cancelled")]
    Cancelled,
}

/// A live, exclusively owned connection to a Varlink service.
pub struct Connection {
    reader: BufReader<BoxedReader>,
    writer: BoxedWriter,
    // Killed on drop unless the connection is closed gracefully first.
    bridge: Option<Child>,
}

impl Connection {
    /// Wraps any bidirectional byte stream.
    pub fn from_io<T>(io: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self::from_parts(Box::new(reader), Box::new(writer), None)
    }

    pub(crate) fn from_parts(
        reader: BoxedReader,
        writer: BoxedWriter,
        bridge: Option<Child>,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            bridge,
        }
    }

    /// Writes one message and flushes it.
    pub async fn write_message(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        framing::write_frame(&mut self.writer, payload).await
    }

    /// Reads the next message.
    pub async fn read_message(&mut self) -> Result<Vec<u8>, TransportError> {
        framing::read_frame(&mut self.reader).await
    }

    /// Shuts the connection down, letting a bridge finish forwarding what it was sent.
    ///
    /// The write side is closed first so the bridge sees end-of-input, then the bridge
    /// process is awaited. If `cancel` fires while waiting, the bridge is killed and
    /// [`TransportError::Cancelled`] is returned. Dropping a connection without closing it
    /// kills the bridge right away.
    pub async fn close(self, cancel: &CancellationToken) -> Result<(), TransportError> {
        let Connection {
            reader,
            mut writer,
            bridge,
        } = self;

        // The peer may already be gone; end-of-input is delivered by the drop regardless.
        if let Err(err) = writer.shutdown().await {
            debug!(%err, "shutting down the write side failed");
        }
        drop(writer);

        let Some(mut child) = bridge else {
            return Ok(());
        };

        let status = cancellable(cancel, child.wait())
            .await
            .ok_or(TransportError::Cancelled)??;
        debug!(%status, "bridge exited");

        drop(reader);
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("bridged", &self.bridge.is_some())
            .finish_non_exhaustive()
    }
}

/// Establishes connections from resolved targets.
///
/// [`SystemConnector`] is the real implementation. Tests provide their own to observe
/// whether (and where) a connection was attempted.
pub trait Connector {
    fn connect(
        &self,
        target: &Target,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Connection, ConnectError>> + Send;
}

/// Dials sockets and spawns bridge processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    async fn connect(
        &self,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<Connection, ConnectError> {
        match target {
            Target::Direct { address } if address.is_empty() => Err(ConnectError::MissingTarget),
            Target::Direct { address } => {
                debug!(%address, "dialing service");

                cancellable(cancel, address::dial(address))
                    .await
                    .ok_or(ConnectError::Cancelled)?
                    .map_err(|source| ConnectError::Dial {
                        address: address.clone(),
                        source,
                    })
            }
            Target::Bridged { command } => {
                if cancel.is_cancelled() {
                    return Err(ConnectError::Cancelled);
                }

                debug!(%command, "spawning bridge");

                bridge::spawn(command).map_err(|source| ConnectError::Bridge {
                    command: command.clone(),
                    source,
                })
            }
        }
    }
}
