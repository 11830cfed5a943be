//! JSON-RPC client state shared by every language server wire.
//!
//! A wire thread owns the socket. It forwards decoded messages as [`Incoming`] and writes whatever
//! the client queues on the outgoing channel; the client itself never touches the socket.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use lsp_types::notification::{
    DidChangeTextDocument, DidOpenTextDocument, Exit, Initialized, Notification,
    PublishDiagnostics,
};
use lsp_types::request::{Completion, Initialize, Request, Shutdown as ShutdownRequest};
use lsp_types::{
    ClientCapabilities, ClientInfo, CompletionParams, CompletionResponse,
    DidChangeTextDocumentParams, DidOpenTextDocumentParams, InitializeParams, InitializedParams,
    Position, PublishDiagnosticsParams, TextDocumentContentChangeEvent, TextDocumentIdentifier,
    TextDocumentItem, TextDocumentPositionParams, Uri, VersionedTextDocumentIdentifier,
    WorkspaceFolder,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use super::config::ResolvedEditorConfig;
use super::transport::{LanguageClient, ServerMessage, TransportError};

/// Messages coming off the wire, before correlation with outstanding requests.
#[derive(Debug)]
pub(crate) enum Incoming {
    Response {
        id: i64,
        result: Value,
        error: Option<Value>,
    },
    Notification {
        method: String,
        params: Value,
    },
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    Disconnected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingRequest {
    Initialize,
    Completion,
    Shutdown,
}

#[derive(Debug)]
enum Phase {
    /// Waiting for the `initialize` response; outgoing notifications are held back.
    Initializing(Vec<Value>),
    Ready,
    Closed,
}

pub(crate) struct RpcClient {
    endpoint: Url,
    outgoing: Option<Sender<Value>>,
    incoming: Receiver<Incoming>,
    pending: HashMap<i64, PendingRequest>,
    next_id: i64,
    phase: Phase,
    document: Option<Url>,
}

impl RpcClient {
    /// Starts `wire` on its own thread and sends `initialize` through it.
    pub(crate) fn start(
        config: &ResolvedEditorConfig,
        thread_name: &str,
        wire: impl FnOnce(Receiver<Value>, Sender<Incoming>) + Send + 'static,
    ) -> Result<Self, TransportError> {
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<Value>();
        let (incoming_tx, incoming_rx) = mpsc::channel::<Incoming>();

        thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || wire(outgoing_rx, incoming_tx))?;

        let mut client = Self {
            endpoint: config.server_uri.clone(),
            outgoing: Some(outgoing_tx),
            incoming: incoming_rx,
            pending: HashMap::new(),
            next_id: 1,
            phase: Phase::Initializing(Vec::new()),
            document: None,
        };
        client.initialize(config)?;
        Ok(client)
    }

    #[allow(deprecated)]
    fn initialize(&mut self, config: &ResolvedEditorConfig) -> Result<(), TransportError> {
        let root = to_lsp_uri(&config.root_uri)?;
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri: Some(root.clone()),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: root,
                name: config.language_id.clone(),
            }]),
            capabilities: ClientCapabilities::default(),
            client_info: Some(ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            ..InitializeParams::default()
        };
        self.request::<Initialize>(params, PendingRequest::Initialize)
    }

    fn request<R: Request>(
        &mut self,
        params: R::Params,
        kind: PendingRequest,
    ) -> Result<(), TransportError>
    where
        R::Params: Serialize,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, kind);
        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": R::METHOD,
            "params": serde_json::to_value(params)?,
        });
        self.send_now(message)
    }

    fn notify<N: Notification>(&mut self, params: N::Params) -> Result<(), TransportError>
    where
        N::Params: Serialize,
    {
        let message = json!({
            "jsonrpc": "2.0",
            "method": N::METHOD,
            "params": serde_json::to_value(params)?,
        });
        match &mut self.phase {
            Phase::Initializing(queued) => {
                queued.push(message);
                Ok(())
            }
            Phase::Ready => self.send_now(message),
            Phase::Closed => Err(TransportError::Closed),
        }
    }

    fn send_now(&mut self, message: Value) -> Result<(), TransportError> {
        let sender = self.outgoing.as_ref().ok_or(TransportError::Closed)?;
        sender.send(message).map_err(|_| TransportError::Closed)
    }

    fn on_initialized(&mut self) -> Result<(), TransportError> {
        let queued = match std::mem::replace(&mut self.phase, Phase::Ready) {
            Phase::Initializing(queued) => queued,
            other => {
                self.phase = other;
                return Ok(());
            }
        };
        debug!(endpoint = %self.endpoint, "language server initialized");
        self.notify::<Initialized>(InitializedParams {})?;
        for message in queued {
            self.send_now(message)?;
        }
        Ok(())
    }

    fn reply(&mut self, id: Value, method: &str, params: &Value) -> Result<(), TransportError> {
        // Server-initiated requests are acknowledged with empty results.
        let result = match method {
            "workspace/configuration" => {
                let items = params
                    .get("items")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Value::Array(vec![Value::Null; items])
            }
            _ => Value::Null,
        };
        self.send_now(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }

    fn translate(&mut self, incoming: Incoming) -> Option<ServerMessage> {
        match incoming {
            Incoming::Response { id, result, error } => {
                let kind = self.pending.remove(&id)?;
                if let Some(error) = error {
                    warn!(endpoint = %self.endpoint, ?kind, %error, "language server request failed");
                }
                match kind {
                    PendingRequest::Initialize => {
                        if let Err(err) = self.on_initialized() {
                            warn!(endpoint = %self.endpoint, %err, "failed to finish initialization");
                        }
                        None
                    }
                    PendingRequest::Completion => {
                        let items = match serde_json::from_value::<Option<CompletionResponse>>(result)
                        {
                            Ok(Some(CompletionResponse::Array(items))) => items,
                            Ok(Some(CompletionResponse::List(list))) => list.items,
                            Ok(None) => Vec::new(),
                            Err(err) => {
                                warn!(%err, "malformed completion response");
                                return None;
                            }
                        };
                        Some(ServerMessage::Completions(items))
                    }
                    PendingRequest::Shutdown => None,
                }
            }
            Incoming::Notification { method, params } if method == PublishDiagnostics::METHOD => {
                let params: PublishDiagnosticsParams = match serde_json::from_value(params) {
                    Ok(params) => params,
                    Err(err) => {
                        warn!(%err, "malformed diagnostics notification");
                        return None;
                    }
                };
                let document = self.document.as_ref()?;
                if params.uri.as_str() != document.as_str() {
                    return None;
                }
                Some(ServerMessage::Diagnostics {
                    version: params.version,
                    diagnostics: params.diagnostics,
                })
            }
            Incoming::Notification { .. } => None,
            Incoming::Request { id, method, params } => {
                if let Err(err) = self.reply(id, &method, &params) {
                    warn!(%err, %method, "failed to answer server request");
                }
                None
            }
            Incoming::Disconnected(reason) => {
                warn!(endpoint = %self.endpoint, %reason, "language server disconnected");
                self.outgoing = None;
                self.phase = Phase::Closed;
                None
            }
        }
    }
}

impl LanguageClient for RpcClient {
    fn did_open(
        &mut self,
        uri: &Url,
        language_id: &str,
        version: i32,
        text: &str,
    ) -> Result<(), TransportError> {
        self.document = Some(uri.clone());
        self.notify::<DidOpenTextDocument>(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: to_lsp_uri(uri)?,
                language_id: language_id.to_string(),
                version,
                text: text.to_string(),
            },
        })
    }

    fn did_change(&mut self, uri: &Url, version: i32, text: &str) -> Result<(), TransportError> {
        self.notify::<DidChangeTextDocument>(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: to_lsp_uri(uri)?,
                version,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: text.to_string(),
            }],
        })
    }

    fn request_completion(&mut self, uri: &Url, position: Position) -> Result<(), TransportError> {
        if !matches!(self.phase, Phase::Ready) {
            return Ok(());
        }
        let params = CompletionParams {
            text_document_position: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier {
                    uri: to_lsp_uri(uri)?,
                },
                position,
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: None,
        };
        self.request::<Completion>(params, PendingRequest::Completion)
    }

    fn try_recv(&mut self) -> Option<ServerMessage> {
        loop {
            let incoming = match self.incoming.try_recv() {
                Ok(incoming) => incoming,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            };
            if let Some(message) = self.translate(incoming) {
                return Some(message);
            }
        }
    }

    fn close(&mut self) {
        if matches!(self.phase, Phase::Closed) {
            return;
        }
        if matches!(self.phase, Phase::Ready) {
            let _ = self.request::<ShutdownRequest>((), PendingRequest::Shutdown);
            let _ = self.send_now(json!({ "jsonrpc": "2.0", "method": Exit::METHOD }));
        }
        self.phase = Phase::Closed;
        // Dropping the sender ends the wire loop, which shuts the socket down.
        self.outgoing = None;
        debug!(endpoint = %self.endpoint, "language server connection closed");
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn to_lsp_uri(url: &Url) -> Result<Uri, TransportError> {
    Uri::from_str(url.as_str())
        .map_err(|err| TransportError::Protocol(format!("invalid uri '{url}': {err}")))
}

pub(crate) fn classify_message(mut message: Value) -> Option<Incoming> {
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
