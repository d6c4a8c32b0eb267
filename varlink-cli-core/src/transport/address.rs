//! Direct service addresses.
//!
//! Supported forms:
//!
//! * `unix:/run/org.example.ftl`: a Unix socket path.
//! * `unix:@org.example.ftl`: an abstract Unix socket (Linux only).
//! * `tcp:127.0.0.1:12345`: a TCP endpoint.
//! * `/run/org.example.ftl`: shorthand for `unix:/run/org.example.ftl`.
//!
//! Services advertise listen parameters after a `;` (`unix:/run/x;mode=0666`). They mean
//! nothing to a client and are dropped before dialing.
use super::Connection;
use std::{io, path::PathBuf, str::FromStr};
use tokio::net::{TcpStream, UnixStream};

/// Errors that can occur while dialing an address.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("unsupported address '{0}', expected 'unix:PATH', 'unix:@NAME' or 'tcp:HOST:PORT'")]
    Unsupported(String),
    #[error("abstract unix sockets are only supported on Linux")]
    AbstractUnsupported,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A parsed direct address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Unix(PathBuf),
    UnixAbstract(String),
    Tcp(String),
}

impl FromStr for Address {
    type Err = DialError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        let unsupported = || DialError::Unsupported(address.to_string());

        if address.starts_with('/') {
            return Ok(Address::Unix(PathBuf::from(strip_listen_parameters(address))));
        }

        let (scheme, rest) = address.split_once(':').ok_or_else(unsupported)?;
        let rest = strip_listen_parameters(rest);

        match scheme {
            "unix" => match rest.strip_prefix('@') {
                Some("") => Err(unsupported()),
                Some(name) => Ok(Address::UnixAbstract(name.to_string())),
                None if rest.is_empty() => Err(unsupported()),
                None => Ok(Address::Unix(PathBuf::from(rest))),
            },
            "tcp" if !rest.is_empty() => Ok(Address::Tcp(rest.to_string())),
            _ => Err(unsupported()),
        }
    }
}

fn strip_listen_parameters(address: &str) -> &str {
    address
        .split_once(';')
        .map_or(address, |(address, _)| address)
}

/// Parses and dials `address`.
pub async fn dial(address: &str) -> Result<Connection, DialError> {
    match address.parse::<Address>()? {
        Address::Unix(path) => {
            let stream = UnixStream::connect(&path).await?;
            Ok(from_unix(stream))
        }
        Address::UnixAbstract(name) => connect_abstract(&name),
        Address::Tcp(endpoint) => {
            let stream = TcpStream::connect(endpoint.as_str()).await?;
            stream.set_nodelay(true)?;
            let (reader, writer) = stream.into_split();
            Ok(Connection::from_parts(
                Box::new(reader),
                Box::new(writer),
                None,
            ))
        }
    }
}

fn from_unix(stream: UnixStream) -> Connection {
    let (reader, writer) = stream.into_split();
    Connection::from_parts(Box::new(reader), Box::new(writer), None)
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> Result<Connection, DialError> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixStream as StdUnixStream};

    let address = SocketAddr::from_abstract_name(name.as_bytes())?;
    // Connecting a local socket does not block for any meaningful time.
    let stream = StdUnixStream::connect_addr(&address)?;
    stream.set_nonblocking(true)?;

    Ok(from_unix(UnixStream::from_std(stream)?))
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &str) -> Result<Connection, DialError> {
    Err(DialError::AbstractUnsupported)
}
