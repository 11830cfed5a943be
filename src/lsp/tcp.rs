//! Language servers reached over a plain TCP socket with `Content-Length` framing.
//!
//! Connecting and all socket I/O happen on background threads so the UI thread never blocks.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use super::config::ResolvedEditorConfig;
use super::rpc::{Incoming, RpcClient};
use super::transport::{LanguageClient, LanguageConnector, TransportError};

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Connects editors to `tcp://host:port` language servers.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl LanguageConnector for TcpConnector {
    fn connect(
        &self,
        config: &ResolvedEditorConfig,
    ) -> Result<Box<dyn LanguageClient>, TransportError> {
        let endpoint = &config.server_uri;
        if endpoint.scheme() != "tcp" {
            return Err(TransportError::UnsupportedScheme(endpoint.scheme().to_string()));
        }
        let addr = socket_addr(endpoint)?;
        let timeout = self.connect_timeout;
        let client = RpcClient::start(config, "lspfield-lsp-tcp", move |outgoing, incoming| {
            run_connection(addr, timeout, outgoing, incoming)
        })?;
        Ok(Box::new(client))
    }
}

/// Resolves the socket address of a language server endpoint.
pub(crate) fn socket_addr(endpoint: &Url) -> Result<SocketAddr, TransportError> {
    let default_port = match endpoint.scheme() {
        "ws" | "http" => Some(80),
        "wss" | "https" => Some(443),
        _ => None,
    };
    endpoint
        .socket_addrs(|| default_port)
        .map_err(|_| TransportError::MissingAddress(endpoint.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::MissingAddress(endpoint.to_string()))
}

fn run_connection(
    addr: SocketAddr,
    timeout: Duration,
    outgoing: Receiver<Value>,
    incoming: Sender<Incoming>,
) {
    let stream = match TcpStream::connect_timeout(&addr, timeout) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = incoming.send(Incoming::Disconnected(err.to_string()));
            return;
        }
    };
    let reader = match stream.try_clone() {
        Ok(reader) => reader,
        Err(err) => {
            let _ = incoming.send(Incoming::Disconnected(err.to_string()));
            return;
        }
    };
    let reader_tx = incoming.clone();
    let spawned = thread::Builder::new()
        .name("lspfield-lsp-reader".into())
        .spawn(move || read_loop(BufReader::new(reader), reader_tx));
    if let Err(err) = spawned {
        let _ = incoming.send(Incoming::Disconnected(err.to_string()));
        return;
    }

    let mut writer = stream;
    for message in outgoing {
        if let Err(err) = write_frame(&mut writer, &message) {
            let _ = incoming.send(Incoming::Disconnected(err.to_string()));
            break;
        }
    }
    let _ = writer.shutdown(Shutdown::Both);
}

fn read_loop(mut reader: impl BufRead, incoming: Sender<Incoming>) {
    loop {
        let message = match read_frame(&mut reader) {
            Ok(Some(message)) => message,
            Ok(None) => {
                let _ = incoming.send(Incoming::Disconnected("end of stream".into()));
                return;
            }
            Err(err) => {
                let _ = incoming.send(Incoming::Disconnected(err.to_string()));
                return;
            }
        };
        let Some(parsed) = classify_message(message) else {
            continue;
        };
        if incoming.send(parsed).is_err() {
            return;
        }
    }
}

fn classify_message(mut message: Value) -> Option<Incoming> {
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);
    let id = message.get_mut("id").map(Value::take);
    let params = message.get_mut("params").map(Value::take).unwrap_or(Value::Null);
    match (method, id) {
        (Some(method), Some(id)) => Some(Incoming::Request { id, method, params }),
        (Some(method), None) => Some(Incoming::Notification { method, params }),
        (None, Some(id)) => Some(Incoming::Response {
            id: id.as_i64()?,
            result: message.get_mut("result").map(Value::take).unwrap_or(Value::Null),
            error: message.get_mut("error").map(Value::take),
        }),
        (None, None) => None,
    }
}

pub(crate) fn write_frame(writer: &mut impl Write, message: &Value) -> std::io::Result<()> {
    let body = serde_json::to_vec(message)?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(&body)?;
    writer.flush()
}

/// Reads one `Content-Length` framed message. `Ok(None)` at a clean end of stream.
pub(crate) fn read_frame(reader: &mut impl BufRead) -> std::io::Result<Option<Value>> {
    let mut content_length = None;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }
    }
    let length = content_length.ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "missing Content-Length header")
    })?;
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;
    let message = serde_json::from_slice(&body)?;
    Ok(Some(message))
}
