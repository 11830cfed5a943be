//! Language servers behind a WebSocket bridge, one JSON-RPC message per text frame.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use tungstenite::{Message, WebSocket, stream::MaybeTlsStream};
use url::Url;

use super::config::ResolvedEditorConfig;
use super::rpc::{Incoming, RpcClient, classify_message};
use super::tcp::{DEFAULT_CONNECT_TIMEOUT, socket_addr};
use super::transport::{LanguageClient, LanguageConnector, TransportError};

/// How long a read waits before the wire checks for outgoing messages again.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Connects editors to `ws://` and `wss://` language servers.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl LanguageConnector for WebSocketConnector {
    fn connect(
        &self,
        config: &ResolvedEditorConfig,
    ) -> Result<Box<dyn LanguageClient>, TransportError> {
        let endpoint = config.server_uri.clone();
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(TransportError::UnsupportedScheme(endpoint.scheme().to_string()));
        }
        let timeout = self.connect_timeout;
        let client = RpcClient::start(config, "lspfield-lsp-ws", move |outgoing, incoming| {
            run_websocket(&endpoint, timeout, outgoing, incoming)
        })?;
        Ok(Box::new(client))
    }
}

fn open_socket(endpoint: &Url, timeout: Duration) -> Result<(Socket, TcpStream), String> {
    let addr = socket_addr(endpoint).map_err(|err| err.to_string())?;
    let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|err| err.to_string())?;
    // A second handle on the same socket, for adjusting timeouts after the handshake.
    let handle = stream.try_clone().map_err(|err| err.to_string())?;
    handle
        .set_read_timeout(Some(timeout))
        .map_err(|err| err.to_string())?;
    let (socket, _) = tungstenite::client_tls_with_config(endpoint.as_str(), stream, None, None)
        .map_err(|err| format!("handshake failed: {err}"))?;
    handle
        .set_read_timeout(Some(POLL_INTERVAL))
        .map_err(|err| err.to_string())?;
    Ok((socket, handle))
}

fn run_websocket(
    endpoint: &Url,
    timeout: Duration,
    outgoing: Receiver<Value>,
    incoming: Sender<Incoming>,
) {
    let (mut socket, _handle) = match open_socket(endpoint, timeout) {
        Ok(opened) => opened,
        Err(reason) => {
            let _ = incoming.send(Incoming::Disconnected(reason));
            return;
        }
    };
    debug!(%endpoint, "websocket connected");
    loop {
        loop {
            match outgoing.try_recv() {
                Ok(message) => {
                    if let Err(err) = socket.send(Message::text(message.to_string())) {
                        let _ = incoming.send(Incoming::Disconnected(err.to_string()));
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    return;
                }
            }
        }
        match socket.read() {
            Ok(Message::Close(_)) => {
                let _ = incoming.send(Incoming::Disconnected("closed by server".into()));
                return;
            }
            Ok(message) if message.is_text() || message.is_binary() => {
                let parsed = message
                    .to_text()
                    .ok()
                    .and_then(|text| serde_json::from_str::<Value>(text).ok())
                    .and_then(classify_message);
                if let Some(parsed) = parsed {
                    if incoming.send(parsed).is_err() {
                        return;
                    }
                }
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => {
                let _ = incoming.send(Incoming::Disconnected(err.to_string()));
                return;
            }
        }
    }
}
