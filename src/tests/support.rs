use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};
use url::Url;

use crate::domain::{FieldId, LanguageSettings};
use crate::form::PropertyBinding;
use crate::lsp::{
    LanguageClient, LanguageConnector, ResolvedEditorConfig, ServerMessage, TransportError,
};

pub(crate) fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

pub(crate) fn ctrl(ch: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
}

pub(crate) fn error_diagnostic() -> Diagnostic {
    Diagnostic {
        range: Range::new(Position::new(0, 0), Position::new(0, 1)),
        severity: Some(DiagnosticSeverity::ERROR),
        message: "unexpected end of input".into(),
        ..Diagnostic::default()
    }
}

pub(crate) fn feel_language() -> LanguageSettings {
    LanguageSettings {
        language_id: Some("feel".into()),
        server_uri: Some("tcp://127.0.0.1:9".into()),
        ..LanguageSettings::default()
    }
}

#[derive(Debug, Default)]
struct Shared {
    log: Vec<String>,
    inbox: VecDeque<ServerMessage>,
    closed: usize,
}

/// Connector whose clients record traffic instead of talking to a server. Clones share state.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingConnector {
    shared: Rc<RefCell<Shared>>,
}

impl RecordingConnector {
    pub(crate) fn log(&self) -> Vec<String> {
        self.shared.borrow().log.clone()
    }

    /// Queues a message for the next `try_recv` of any open client.
    pub(crate) fn push(&self, message: ServerMessage) {
        self.shared.borrow_mut().inbox.push_back(message);
    }

    pub(crate) fn closed(&self) -> usize {
        self.shared.borrow().closed
    }
}

impl LanguageConnector for RecordingConnector {
    fn connect(
        &self,
        _config: &ResolvedEditorConfig,
    ) -> Result<Box<dyn LanguageClient>, TransportError> {
        Ok(Box::new(RecordingClient {
            shared: Rc::clone(&self.shared),
            closed: false,
        }))
    }
}

struct RecordingClient {
    shared: Rc<RefCell<Shared>>,
    closed: bool,
}

impl RecordingClient {
    fn record(&self, entry: String) {
        self.shared.borrow_mut().log.push(entry);
    }
}

impl LanguageClient for RecordingClient {
    fn did_open(
        &mut self,
        _uri: &Url,
        _language_id: &str,
        version: i32,
        text: &str,
    ) -> Result<(), TransportError> {
        self.record(format!("open {version} {text}"));
        Ok(())
    }

    fn did_change(&mut self, _uri: &Url, version: i32, text: &str) -> Result<(), TransportError> {
        self.record(format!("change {version} {text}"));
        Ok(())
    }

    fn request_completion(&mut self, _uri: &Url, position: Position) -> Result<(), TransportError> {
        self.record(format!("complete {}:{}", position.line, position.character));
        Ok(())
    }

    fn try_recv(&mut self) -> Option<ServerMessage> {
        if self.closed {
            return None;
        }
        self.shared.borrow_mut().inbox.pop_front()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut shared = self.shared.borrow_mut();
        shared.closed += 1;
        shared.log.push("close".into());
    }
}

/// In-memory binding that records every write as `(value, validation_error)`.
#[derive(Debug, Default)]
pub(crate) struct MemoryBinding {
    values: HashMap<FieldId, Option<String>>,
    commits: Vec<(Option<String>, Option<String>)>,
}

impl MemoryBinding {
    pub(crate) fn with_value(field: &str, value: Option<&str>) -> Self {
        let mut binding = Self::default();
        binding
            .values
            .insert(FieldId::from(field), value.map(str::to_string));
        binding
    }

    pub(crate) fn commits(&self) -> &[(Option<String>, Option<String>)] {
        &self.commits
    }

    pub(crate) fn committed_values(&self) -> Vec<Option<&str>> {
        self.commits
            .iter()
            .map(|(value, _)| value.as_deref())
            .collect()
    }
}

impl PropertyBinding for MemoryBinding {
    fn get_value(&self, field: &FieldId) -> Option<String> {
        self.values.get(field).cloned().flatten()
    }

    fn set_value(&mut self, field: &FieldId, value: Option<String>, validation_error: Option<String>) {
        self.values.insert(field.clone(), value.clone());
        self.commits.push((value, validation_error));
    }
}
