//! # Command Dispatcher
//!
//! Runs one parsed [`Commands`] value to completion and hands back what should be printed.
//!
//! Each command composes the same steps: resolve the target, establish a connection
//! through a [`Connector`], perform the request and return an [`Output`]. Printing and
//! exit codes stay in `main`, so every flow can be driven from tests with a fake connector.
use crate::{cli::Commands, config::Configuration};
use tracing::debug;
use varlink_cli_core::{
    CancellationToken,
    client::{RequestError, VarlinkClient},
    protocol::{
        CallFlags, EncodeError, MethodCall, Parameters, RemoteError, Reply, ServiceInfo,
        parse_parameters,
    },
    target::{self, ResolveError, Target},
    transport::{ConnectError, Connector},
};

/// The successful result of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// `info`: the service's identity and interface list.
    Info(ServiceInfo),
    /// `help`: the interface description, printed verbatim.
    Description(String),
    /// `call`: the reply parameters.
    Reply(Parameters),
    /// `call --oneway`: the request was sent and nothing is printed.
    Sent,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("Cannot get info for '{target}': {source}")]
    Info {
        target: String,
        #[source]
        source: RequestError,
    },
    #[error("Cannot get interface description for '{interface}': {source}")]
    Help {
        interface: String,
        #[source]
        source: RequestError,
    },
    #[error("Error calling '{method}': {source}")]
    Call {
        method: String,
        #[source]
        source: RequestError,
    },
    #[error("Call failed with error: {0}")]
    Remote(RemoteError),
}

impl CommandError {
    /// `1` for usage errors, `2` for everything that went wrong while doing the work.
    pub fn exit_code(&self) -> u8 {
        match self {
            CommandError::Resolve(ResolveError::MissingArgument) => 1,
            _ => 2,
        }
    }

    pub fn is_usage(&self) -> bool {
        self.exit_code() == 1
    }
}

/// Executes `command` with the shared `config`.
pub async fn run<C>(
    config: &Configuration,
    command: &Commands,
    connector: &C,
    cancel: &CancellationToken,
) -> Result<Output, CommandError>
where
    C: Connector,
{
    debug!(command = command.name(), bridge = ?config.bridge(), "running command");

    match command {
        Commands::Info { address } => info(config, address.as_deref(), connector, cancel).await,
        Commands::Help { interface } => help(config, interface.as_deref(), connector, cancel).await,
        Commands::Call {
            oneway,
            method,
            parameters,
        } => {
            let flags = if *oneway {
                CallFlags::ONEWAY
            } else {
                CallFlags::empty()
            };
            call(
                config,
                method.as_deref(),
                parameters.as_deref().unwrap_or_default(),
                flags,
                connector,
                cancel,
            )
            .await
        }
    }
}

async fn info<C: Connector>(
    config: &Configuration,
    address: Option<&str>,
    connector: &C,
    cancel: &CancellationToken,
) -> Result<Output, CommandError> {
    let target = Target::for_service(address, config.bridge())?;
    let info_error = |source| CommandError::Info {
        target: target.to_string(),
        source,
    };

    let mut client = VarlinkClient::connect(connector, &target, cancel).await?;
    let info = client.info(cancel).await.map_err(info_error)?;
    client.close(cancel).await.map_err(info_error)?;

    Ok(Output::Info(info))
}

async fn help<C: Connector>(
    config: &Configuration,
    argument: Option<&str>,
    connector: &C,
    cancel: &CancellationToken,
) -> Result<Output, CommandError> {
    let resolved = target::resolve_interface(argument, config.bridge())?;
    let interface = resolved.reference.as_str();
    let help_error = |source| CommandError::Help {
        interface: interface.to_string(),
        source,
    };

    let mut client = VarlinkClient::connect(connector, &resolved.target, cancel).await?;
    let description = client
        .interface_description(cancel, interface)
        .await
        .map_err(help_error)?;
    client.close(cancel).await.map_err(help_error)?;

    Ok(Output::Description(description))
}

async fn call<C: Connector>(
    config: &Configuration,
    argument: Option<&str>,
    raw_parameters: &str,
    flags: CallFlags,
    connector: &C,
    cancel: &CancellationToken,
) -> Result<Output, CommandError> {
    // Parameters are validated before anything touches the network.
    let parameters = parse_parameters(raw_parameters)?;
    let resolved = target::resolve_method(argument, config.bridge())?;

    let method = resolved.reference.to_string();
    let call = MethodCall::new(method.clone(), parameters, flags);
    let call_error = |source| CommandError::Call {
        method: method.clone(),
        source,
    };

    let mut client = VarlinkClient::connect(connector, &resolved.target, cancel).await?;

    let output = match client.send(&call, cancel).await.map_err(call_error)? {
        None => Output::Sent,
        Some(pending) => match pending.recv(cancel).await.map_err(call_error)? {
            Reply::Success(parameters) => Output::Reply(parameters),
            Reply::Error(remote) => return Err(CommandError::Remote(remote)),
        },
    };

    // A bridge still has to forward a oneway request once it sees end-of-input.
    client.close(cancel).await.map_err(call_error)?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_service::RequestLog;
    use serde_json::json;
    use std::sync::Mutex;
    use varlink_cli_core::transport::Connection;

    /// Connects every target to an in-memory echo service and records where it was asked to go.
    #[derive(Default)]
    struct EchoConnector {
        dialed: Mutex<Vec<Target>>,
        log: RequestLog,
    }

    impl EchoConnector {
        fn dialed(&self) -> Vec<Target> {
            self.dialed.lock().unwrap().clone()
        }
    }

    impl Connector for EchoConnector {
        async fn connect(
            &self,
            target: &Target,
            _cancel: &CancellationToken,
        ) -> Result<Connection, ConnectError> {
            self.dialed.lock().unwrap().push(target.clone());

            let (local, remote) = tokio::io::duplex(64 * 1024);
            tokio::spawn(echo_service::serve(remote, self.log.clone()));

            Ok(Connection::from_io(local))
        }
    }

    fn config(bridge: Option<&str>) -> Configuration {
        Configuration {
            bridge: bridge.map(str::to_string),
            ..Configuration::default()
        }
    }

    fn call(method: &str, parameters: &str, oneway: bool) -> Commands {
        Commands::Call {
            oneway,
            method: Some(method.to_string()),
            parameters: Some(parameters.to_string()),
        }
    }

    async fn run_with(
        connector: &EchoConnector,
        config: &Configuration,
        command: Commands,
    ) -> Result<Output, CommandError> {
        run(config, &command, connector, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn info_renders_service_identity() {
        let connector = EchoConnector::default();
        let command = Commands::Info {
            address: Some("unix:/run/echo".to_string()),
        };

        let Output::Info(info) = run_with(&connector, &config(None), command).await.unwrap() else {
            panic!("expected info output");
        };

        assert_eq!(info.product, "Echo Service");
        assert!(info.interfaces.contains(&"org.example.echo".to_string()));
        assert_eq!(
            connector.dialed(),
            vec![Target::Direct {
                address: "unix:/run/echo".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn info_without_address_or_bridge_is_operational() {
        let connector = EchoConnector::default();

        let err = run_with(&connector, &config(None), Commands::Info { address: None })
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Resolve(ResolveError::MissingTarget)));
        assert_eq!(err.exit_code(), 2);
        assert!(connector.dialed().is_empty());
    }

    #[tokio::test]
    async fn help_returns_description_verbatim() {
        let connector = EchoConnector::default();
        let command = Commands::Help {
            interface: Some("unix:/run/echo/org.example.echo".to_string()),
        };

        let output = run_with(&connector, &config(None), command).await.unwrap();

        assert_eq!(output, Output::Description(echo_service::DESCRIPTION.to_string()));
    }

    #[tokio::test]
    async fn call_returns_reply_parameters() {
        let connector = EchoConnector::default();
        let command = call("unix:/run/echo/org.example.echo.Echo", r#"{"message": "hi"}"#, false);

        let output = run_with(&connector, &config(None), command).await.unwrap();

        assert_eq!(
            output,
            Output::Reply(json!({ "message": "hi" }).as_object().unwrap().clone())
        );
        assert_eq!(
            connector.log.requests(),
            vec![json!({ "method": "org.example.echo.Echo", "parameters": { "message": "hi" } })]
        );
    }

    #[tokio::test]
    async fn invalid_parameters_never_dial() {
        let connector = EchoConnector::default();

        for raw in ["{not json", "[1, 2]", "\"text\""] {
            let command = call("unix:/run/echo/org.example.echo.Echo", raw, false);
            let err = run_with(&connector, &config(None), command).await.unwrap_err();

            assert!(matches!(err, CommandError::Encode(_)), "{raw}: {err}");
            assert_eq!(err.exit_code(), 2);
        }

        assert!(connector.dialed().is_empty());
    }

    #[tokio::test]
    async fn missing_method_is_a_usage_error() {
        let connector = EchoConnector::default();
        let command = Commands::Call {
            oneway: false,
            method: None,
            parameters: None,
        };

        let err = run_with(&connector, &config(None), command).await.unwrap_err();

        assert!(err.is_usage());
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn argument_without_slash_is_invalid_address() {
        let connector = EchoConnector::default();
        let command = call("org.example.echo.Echo", "", false);

        let err = run_with(&connector, &config(None), command).await.unwrap_err();

        assert!(matches!(err, CommandError::Resolve(ResolveError::InvalidAddress(_))));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn remote_error_is_reported_with_parameters() {
        let connector = EchoConnector::default();
        let command = call("unix:/run/echo/org.example.echo.Lookup", "{}", false);

        let err = run_with(&connector, &config(None), command).await.unwrap_err();

        let CommandError::Remote(remote) = &err else {
            panic!("expected a remote error, got {err:?}");
        };
        assert_eq!(remote.name, "org.example.echo.NotFound");
        assert_eq!(remote.parameters, json!({ "id": 5 }).as_object().cloned());
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn oneway_call_does_not_wait_for_a_reply() {
        let connector = EchoConnector::default();
        let command = call("unix:/run/echo/org.example.echo.Silent", "", true);

        let output = run_with(&connector, &config(None), command).await.unwrap();

        assert_eq!(output, Output::Sent);
    }

    #[tokio::test]
    async fn bridge_takes_the_argument_as_reference() {
        let connector = EchoConnector::default();
        let command = call("org.example.echo.Echo", "{}", false);

        let output = run_with(&connector, &config(Some("varlink bridge")), command)
            .await
            .unwrap();

        assert_eq!(output, Output::Reply(Parameters::new()));
        assert_eq!(
            connector.dialed(),
            vec![Target::Bridged {
                command: "varlink bridge".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn cancelled_call_stops_waiting() {
        let connector = EchoConnector::default();
        let command = call("unix:/run/echo/org.example.echo.Silent", "", false);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run(&config(None), &command, &connector, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommandError::Call {
                source: RequestError::Cancelled,
                ..
            }
        ));
        assert_eq!(err.exit_code(), 2);
    }
}
