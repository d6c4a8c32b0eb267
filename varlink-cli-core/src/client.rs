//! # Varlink Client
//!
//! [`VarlinkClient`] owns one [`Connection`] for the lifetime of a command and performs
//! the three operations the CLI needs:
//!
//! 1. **[`VarlinkClient::info`]**: `org.varlink.service.GetInfo`.
//! 2. **[`VarlinkClient::interface_description`]**: `org.varlink.service.GetInterfaceDescription`.
//! 3. **[`VarlinkClient::send`]**: an arbitrary [`MethodCall`]. Unless the call is oneway,
//!    this hands back a [`PendingReply`] that resolves into a [`Reply`].
//!
//! Every operation takes a [`CancellationToken`]. When it fires, the operation stops
//! waiting and returns [`RequestError::Cancelled`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use varlink_cli_core::{CancellationToken, client::VarlinkClient, target::Target};
//! use varlink_cli_core::transport::SystemConnector;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cancel = CancellationToken::new();
//! let target = Target::Direct { address: "unix:/run/org.example.ftl".to_string() };
//!
//! let mut client = VarlinkClient::connect(&SystemConnector, &target, &cancel).await?;
//! let info = client.info(&cancel).await?;
//! println!("{} {}", info.product, info.version);
//! # Ok(())
//! # }
//! ```
use crate::{
    CancellationToken, cancellable,
    protocol::{self, InterfaceDescription, MethodCall, Parameters, RemoteError, Reply, ServiceInfo},
    target::Target,
    transport::{ConnectError, Connection, Connector, TransportError},
};
use tracing::debug;

/// Errors that can occur while performing a request on an established connection.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Call failed with error: {0}")]
    Remote(RemoteError),
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<protocol::DecodeError> for RequestError {
    fn from(err: protocol::DecodeError) -> Self {
        RequestError::Transport(TransportError::Decode(err))
    }
}

/// A client bound to a single Varlink connection.
#[derive(Debug)]
pub struct VarlinkClient {
    connection: Connection,
}

impl VarlinkClient {
    /// Wraps an already established connection.
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Establishes a connection to `target` through `connector`.
    pub async fn connect<C>(
        connector: &C,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<Self, ConnectError>
    where
        C: Connector,
    {
        let connection = connector.connect(target, cancel).await?;
        debug!(%target, "connected");
        Ok(Self::new(connection))
    }

    /// Sends `call` to the service.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The call is oneway; it has been flushed and no reply will come.
    /// * `Ok(Some(PendingReply))` - The call has been sent; await the reply through it.
    /// * `Err(RequestError)` - The request could not be written or the token was cancelled.
    pub async fn send(
        &mut self,
        call: &MethodCall,
        cancel: &CancellationToken,
    ) -> Result<Option<PendingReply<'_>>, RequestError> {
        let payload = call.encode().map_err(TransportError::Encode)?;

        debug!(
            method = call.method(),
            oneway = call.flags().is_oneway(),
            "sending method call"
        );

        cancellable(cancel, self.connection.write_message(&payload))
            .await
            .ok_or(RequestError::Cancelled)??;

        if call.flags().is_oneway() {
            return Ok(None);
        }

        Ok(Some(PendingReply {
            connection: &mut self.connection,
        }))
    }

    /// Sends `call` and waits for its reply, turning a remote error into [`RequestError::Remote`].
    async fn request(
        &mut self,
        call: &MethodCall,
        cancel: &CancellationToken,
    ) -> Result<Parameters, RequestError> {
        let Some(pending) = self.send(call, cancel).await? else {
            return Ok(Parameters::new());
        };

        pending
            .recv(cancel)
            .await?
            .into_result()
            .map_err(RequestError::Remote)
    }

    /// Fetches the service's vendor, product, version, url and interface list.
    pub async fn info(&mut self, cancel: &CancellationToken) -> Result<ServiceInfo, RequestError> {
        let parameters = self.request(&MethodCall::get_info(), cancel).await?;
        Ok(protocol::decode_parameters(parameters)?)
    }

    /// Fetches the textual description of `interface`.
    pub async fn interface_description(
        &mut self,
        cancel: &CancellationToken,
        interface: &str,
    ) -> Result<String, RequestError> {
        let call = MethodCall::get_interface_description(interface);
        let parameters = self.request(&call, cancel).await?;
        let reply: InterfaceDescription = protocol::decode_parameters(parameters)?;
        Ok(reply.description)
    }

    /// Closes the connection, waiting for a bridge to deliver everything it was sent.
    ///
    /// Call this once the exchange succeeded. Dropping the client instead kills the
    /// bridge without waiting, which is what error and cancellation paths want.
    pub async fn close(self, cancel: &CancellationToken) -> Result<(), RequestError> {
        match self.connection.close(cancel).await {
            Ok(()) => Ok(()),
            Err(TransportError::Cancelled) => Err(RequestError::Cancelled),
            Err(err) => Err(RequestError::Transport(err)),
        }
    }
}

/// The reply side of a sent, non-oneway call.
#[derive(Debug)]
pub struct PendingReply<'a> {
    connection: &'a mut Connection,
}

impl PendingReply<'_> {
    /// Waits for the service's reply.
    ///
    /// # Returns
    ///
    /// * `Ok(Reply::Success)` - The call succeeded.
    /// * `Ok(Reply::Error)` - The call was executed, but the service reported a named error.
    /// * `Err(RequestError)` - The reply could not be read or decoded, or the token was cancelled.
    pub async fn recv(self, cancel: &CancellationToken) -> Result<Reply, RequestError> {
        let frame = cancellable(cancel, self.connection.read_message())
            .await
            .ok_or(RequestError::Cancelled)??;

        let reply = Reply::decode(&frame)?;

        if let Reply::Error(RemoteError { name, .. }) = &reply {
            debug!(error = %name, "service replied with an error");
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CallFlags;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    fn client() -> (VarlinkClient, BufReader<DuplexStream>) {
        let (local, remote) = tokio::io::duplex(4096);
        (
            VarlinkClient::new(Connection::from_io(local)),
            BufReader::new(remote),
        )
    }

    async fn next_request(remote: &mut BufReader<DuplexStream>) -> serde_json::Value {
        let mut frame = Vec::new();
        remote.read_until(0, &mut frame).await.unwrap();
        frame.pop();
        serde_json::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn oneway_returns_without_reply() {
        let (mut client, mut remote) = client();
        let cancel = CancellationToken::new();
        let call = MethodCall::from_raw("org.example.ftl.Reset", "", CallFlags::ONEWAY).unwrap();

        let pending = client.send(&call, &cancel).await.unwrap();

        assert!(pending.is_none());
        assert_eq!(
            next_request(&mut remote).await,
            json!({ "method": "org.example.ftl.Reset", "oneway": true })
        );
    }

    #[tokio::test]
    async fn receives_reply_for_sent_call() {
        let (mut client, mut remote) = client();
        let cancel = CancellationToken::new();
        let call = MethodCall::from_raw("org.example.ftl.Add", r#"{"a": 1}"#, CallFlags::empty())
            .unwrap();

        let pending = client.send(&call, &cancel).await.unwrap().unwrap();

        assert_eq!(
            next_request(&mut remote).await,
            json!({ "method": "org.example.ftl.Add", "parameters": { "a": 1 } })
        );
        remote
            .get_mut()
            .write_all(b"{\"parameters\":{\"sum\":1}}\0")
            .await
            .unwrap();

        let reply = pending.recv(&cancel).await.unwrap();
        assert_eq!(reply, Reply::Success(json!({ "sum": 1 }).as_object().unwrap().clone()));
    }

    #[tokio::test]
    async fn cancelling_while_awaiting_reply_returns_promptly() {
        let (mut client, _remote) = client();
        let cancel = CancellationToken::new();
        let call = MethodCall::from_raw("org.example.ftl.Wait", "", CallFlags::empty()).unwrap();

        let pending = client.send(&call, &cancel).await.unwrap().unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), pending.recv(&cancel))
            .await
            .expect("recv did not observe cancellation");

        assert!(matches!(result, Err(RequestError::Cancelled)));
    }

    #[tokio::test]
    async fn remote_errors_surface_from_info() {
        let (mut client, mut remote) = client();
        let cancel = CancellationToken::new();

        let responder = tokio::spawn(async move {
            let request = next_request(&mut remote).await;
            assert_eq!(request, json!({ "method": "org.varlink.service.GetInfo" }));
            remote
                .get_mut()
                .write_all(b"{\"error\":\"org.varlink.service.PermissionDenied\"}\0")
                .await
                .unwrap();
            remote
        });

        let err = client.info(&cancel).await.unwrap_err();
        responder.await.unwrap();

        assert!(matches!(
            err,
            RequestError::Remote(RemoteError { ref name, parameters: None })
                if name == "org.varlink.service.PermissionDenied"
        ));
    }

    #[tokio::test]
    async fn dropped_connection_is_a_transport_error() {
        let (mut client, remote) = client();
        let cancel = CancellationToken::new();
        drop(remote);

        let err = client
            .interface_description(&cancel, "org.example.ftl")
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Transport(_)));
    }
}
