//! # Varlink CLI Core
//!
//! `varlink-cli-core` is the library powering the `varlink` command line tool. It provides
//! everything needed to perform one Varlink method call against a running service, either by
//! dialing the service directly or by talking through a bridge process.
//!
//! ## Key Components
//!
//! * **[`target`]:** Turns a command line argument into a [`target::Target`] (where to connect)
//!   and a [`target::MethodReference`] (what to call), splitting `ADDRESS/INTERFACE.METHOD`
//!   URIs on their last `/`.
//! * **[`transport`]:** The [`transport::Connection`] capability and the [`transport::Connector`]
//!   trait used to establish it. [`transport::SystemConnector`] dials `unix:` / `tcp:` addresses
//!   or spawns bridge commands.
//! * **[`protocol`]:** The messages exchanged with a service: [`protocol::MethodCall`] (the encoder),
//!   [`protocol::Reply`] (the decoder) and [`protocol::ServiceInfo`].
//! * **[`client::VarlinkClient`]:** Composes the above. Every suspending operation takes a
//!   [`CancellationToken`] and returns promptly once it is cancelled.
//!
//! ## Re-exports
//!
//! This crate re-exports `serde_json` and `tokio_util` so that consumers build parameters and
//! cancellation tokens with the same versions the library uses.
pub mod client;
pub mod protocol;
pub mod target;
pub mod transport;

// Re-exports
pub use serde_json;
pub use tokio_util;
pub use tokio_util::sync::CancellationToken;

/// Runs `future` until it completes or `cancel` fires, whichever comes first.
///
/// Returns `None` when cancelled. The future is dropped in that case, which releases
/// whatever it was holding (half-open sockets, spawned processes).
pub(crate) async fn cancellable<F>(cancel: &CancellationToken, future: F) -> Option<F::Output>
where
    F: std::future::Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = future => Some(output),
    }
}
