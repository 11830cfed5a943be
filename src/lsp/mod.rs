//! Structured editor sessions and their language server connections.

mod config;
mod document;
mod probe;
mod rpc;
mod session;
mod tcp;
mod transport;
mod ws;

pub use config::{
    ConnectionErrors, EditorConfig, EditorError, ResolvedEditorConfig, default_document_uri,
};
pub use document::{EditorDocument, Selection, SelectionRange};
pub use probe::{ConnectivityProbe, connection_error_message};
pub use session::{EditorEvent, StructuredEditorSession, Suggestions, has_error_diagnostic};
pub use tcp::TcpConnector;
pub use transport::{
    LanguageClient, LanguageConnector, OfflineConnector, ServerConnector, ServerMessage,
    TransportError,
};
pub use ws::WebSocketConnector;
