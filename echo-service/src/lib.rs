//! # Echo Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide a Varlink service
//! implementing `org.example.echo` for integration testing the `varlink` CLI tool.
//! It is not intended for production use.
use serde_json::{Value, json};
use std::{
    io,
    path::Path,
    sync::{Arc, Mutex},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::UnixListener,
};

pub const INTERFACE: &str = "org.example.echo";
pub const DESCRIPTION: &str = include_str!("../interface/org.example.echo.varlink");

const SERVICE_INTERFACE: &str = "org.varlink.service";
const SERVICE_DESCRIPTION: &str = "interface org.varlink.service
method GetInfo() -> (vendor: string, product: string, version: string, url: string, interfaces: []string)
method GetInterfaceDescription(interface: string) -> (description: string)
error InterfaceNotFound (interface: string)
error MethodNotFound (method: string)
";

/// Every request received by the service, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<Value>>>);

impl RequestLog {
    pub fn requests(&self) -> Vec<Value> {
        self.0.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, request: Value) {
        if let Ok(mut requests) = self.0.lock() {
            requests.push(request);
        }
    }
}

/// Serves a single connection until the peer hangs up.
pub async fn serve<T>(io: T, log: RequestLog) -> io::Result<()>
where
    T: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(io);
    let mut reader = BufReader::new(reader);

    loop {
        let mut frame = Vec::new();
        if reader.read_until(0, &mut frame).await? == 0 || frame.pop() != Some(0) {
            return Ok(());
        }

        let Ok(request) = serde_json::from_slice::<Value>(&frame) else {
            return Ok(());
        };

        log.record(request.clone());

        if let Some(reply) = reply_to(&request) {
            writer.write_all(reply.to_string().as_bytes()).await?;
            writer.write_all(&[0]).await?;
            writer.flush().await?;
        }
    }
}

/// Accepts connections forever, serving each one on its own task.
pub async fn serve_listener(listener: UnixListener, log: RequestLog) -> io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let log = log.clone();
        tokio::spawn(async move {
            let _ = serve(stream, log).await;
        });
    }
}

/// Binds `path` and serves it from a background thread running its own runtime.
///
/// The socket is bound before this returns, so clients can connect right away. Useful
/// for tests that drive the CLI binary from blocking code.
pub fn spawn_on_socket(path: &Path) -> io::Result<RequestLog> {
    let listener = std::os::unix::net::UnixListener::bind(path)?;
    listener.set_nonblocking(true)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let log = RequestLog::default();
    let served = log.clone();

    std::thread::spawn(move || {
        runtime.block_on(async move {
            if let Ok(listener) = UnixListener::from_std(listener) {
                let _ = serve_listener(listener, served).await;
            }
        });
    });

    Ok(log)
}

fn reply_to(request: &Value) -> Option<Value> {
    if request.get("oneway").and_then(Value::as_bool) == Some(true) {
        return None;
    }

    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let parameters = request.get("parameters");

    let reply = match method {
        "org.varlink.service.GetInfo" => json!({
            "parameters": {
                "vendor": "Varlink",
                "product": "Echo Service",
                "version": "1",
                "url": "https://varlink.org",
                "interfaces": [SERVICE_INTERFACE, INTERFACE]
            }
        }),
        "org.varlink.service.GetInterfaceDescription" => {
            let interface = parameters
                .and_then(|p| p.get("interface"))
                .and_then(Value::as_str)
                .unwrap_or_default();

            match interface {
                INTERFACE => json!({ "parameters": { "description": DESCRIPTION } }),
                SERVICE_INTERFACE => json!({ "parameters": { "description": SERVICE_DESCRIPTION } }),
                other => error("org.varlink.service.InterfaceNotFound", json!({ "interface": other })),
            }
        }
        "org.example.echo.Echo" => match parameters {
            Some(parameters) => json!({ "parameters": parameters }),
            None => json!({}),
        },
        "org.example.echo.Lookup" => {
            let id = parameters
                .and_then(|p| p.get("id"))
                .cloned()
                .unwrap_or(json!(5));
            error("org.example.echo.NotFound", json!({ "id": id }))
        }
        "org.example.echo.Silent" => return None,
        other if other.starts_with("org.example.echo.") => {
            error("org.varlink.service.MethodNotFound", json!({ "method": other }))
        }
        other => {
            let interface = other.rsplit_once('.').map_or(other, |(interface, _)| interface);
            error("org.varlink.service.InterfaceNotFound", json!({ "interface": interface }))
        }
    };

    Some(reply)
}

fn error(name: &str, parameters: Value) -> Value {
    json!({ "error": name, "parameters": parameters })
}
