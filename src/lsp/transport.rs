use std::io;
use std::time::Duration;

use lsp_types::{CompletionItem, Diagnostic, Position};
use tracing::debug;
use url::Url;

use super::config::ResolvedEditorConfig;
use super::tcp::TcpConnector;
use super::ws::WebSocketConnector;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported language server scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("language server endpoint '{0}' has no host or port")]
    MissingAddress(String),
    #[error("language servers are disabled")]
    Offline,
    #[error("connection closed")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Asynchronous traffic from the language server, drained by the editor session on tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Diagnostics {
        version: Option<i32>,
        diagnostics: Vec<Diagnostic>,
    },
    Completions(Vec<CompletionItem>),
}

/// One live connection to a language server, bound to one document.
pub trait LanguageClient {
    fn did_open(
        &mut self,
        uri: &Url,
        language_id: &str,
        version: i32,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Full-document sync.
    fn did_change(&mut self, uri: &Url, version: i32, text: &str) -> Result<(), TransportError>;

    fn request_completion(&mut self, uri: &Url, position: Position) -> Result<(), TransportError>;

    fn try_recv(&mut self) -> Option<ServerMessage>;

    fn close(&mut self);
}

/// Opens connections for editor sessions.
pub trait LanguageConnector {
    fn connect(
        &self,
        config: &ResolvedEditorConfig,
    ) -> Result<Box<dyn LanguageClient>, TransportError>;
}

/// Never connects; editors run without live assistance.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineConnector;

impl LanguageConnector for OfflineConnector {
    fn connect(
        &self,
        config: &ResolvedEditorConfig,
    ) -> Result<Box<dyn LanguageClient>, TransportError> {
        debug!(server = %config.server_uri, "offline, not connecting");
        Err(TransportError::Offline)
    }
}

/// Picks the wire by endpoint scheme: `tcp://` framed sockets, `ws://` and `wss://` WebSockets.
#[derive(Debug, Clone, Default)]
pub struct ServerConnector {
    tcp: TcpConnector,
    websocket: WebSocketConnector,
}

impl ServerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(self, timeout: Duration) -> Self {
        Self {
            tcp: self.tcp.with_connect_timeout(timeout),
            websocket: self.websocket.with_connect_timeout(timeout),
        }
    }
}

impl LanguageConnector for ServerConnector {
    fn connect(
        &self,
        config: &ResolvedEditorConfig,
    ) -> Result<Box<dyn LanguageClient>, TransportError> {
        match config.server_uri.scheme() {
            "tcp" => self.tcp.connect(config),
            "ws" | "wss" => self.websocket.connect(config),
            other => Err(TransportError::UnsupportedScheme(other.to_string())),
        }
    }
}
