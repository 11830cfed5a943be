use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lsp_types::{CompletionItem, Diagnostic, DiagnosticSeverity, Position};
use tracing::{debug, warn};

use super::config::{ConnectionErrors, EditorConfig, EditorError, ResolvedEditorConfig};
use super::document::{EditorDocument, Selection};
use super::probe::{ConnectivityProbe, PROBE_TIMEOUT};
use super::transport::{LanguageClient, LanguageConnector, ServerMessage, TransportError};

/// Notifications from the editor to its host, drained with
/// [`StructuredEditorSession::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Document body changed, by typing or by `set_value`.
    Changed(String),
    /// Current diagnostics of the document. Empty once they clear.
    Lint(Vec<Diagnostic>),
    ConnectionError(String),
    /// Backspace pressed with the caret at the very start of the document.
    DemoteRequested,
}

pub fn has_error_diagnostic(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|diagnostic| diagnostic.severity == Some(DiagnosticSeverity::ERROR))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestions {
    pub items: Vec<CompletionItem>,
    pub selected: usize,
}

impl Suggestions {
    pub fn current(&self) -> Option<&CompletionItem> {
        self.items.get(self.selected)
    }
}

/// One live structured editor bound to at most one language server connection.
///
/// The connection opens at construction and closes exactly once, on [`dispose`](Self::dispose) or
/// drop. Without a connection the editor keeps working, only without completions or diagnostics.
pub struct StructuredEditorSession {
    config: ResolvedEditorConfig,
    document: EditorDocument,
    client: Option<Box<dyn LanguageClient>>,
    probe: Option<ConnectivityProbe>,
    version: i32,
    diagnostics: Vec<Diagnostic>,
    suggestions: Option<Suggestions>,
    completion_requested: bool,
    focused: bool,
    disposed: bool,
    events: Vec<EditorEvent>,
}

impl std::fmt::Debug for StructuredEditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredEditorSession")
            .field("document_uri", &self.config.document_uri.as_str())
            .field("text", &self.document.text())
            .field("connected", &self.client.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl StructuredEditorSession {
    /// Fails when the language id or server endpoint is missing.
    pub fn open(
        config: &EditorConfig,
        value: &str,
        connector: &dyn LanguageConnector,
    ) -> Result<Self, EditorError> {
        let resolved = config.resolve()?;
        Ok(Self::with_resolved(resolved, value, connector))
    }

    pub fn with_resolved(
        config: ResolvedEditorConfig,
        value: &str,
        connector: &dyn LanguageConnector,
    ) -> Self {
        let mut session = Self {
            document: EditorDocument::new(value),
            client: None,
            probe: None,
            version: 1,
            diagnostics: Vec::new(),
            suggestions: None,
            completion_requested: false,
            focused: false,
            disposed: false,
            events: Vec::new(),
            config,
        };
        session.connect(connector);
        session
    }

    fn connect(&mut self, connector: &dyn LanguageConnector) {
        let report = self.config.connection_errors == ConnectionErrors::Report;
        match connector.connect(&self.config) {
            Ok(mut client) => {
                let text = self.config.wrap(self.document.text());
                let opened = client.did_open(
                    &self.config.document_uri,
                    &self.config.language_id,
                    self.version,
                    &text,
                );
                if let Err(err) = opened {
                    warn!(uri = %self.config.document_uri, %err, "didOpen failed");
                }
                debug!(server = %self.config.server_uri, "language server connection opened");
                self.client = Some(client);
                if report {
                    self.probe = Some(ConnectivityProbe::spawn(
                        &self.config.server_uri,
                        PROBE_TIMEOUT,
                    ));
                }
            }
            Err(err) => {
                warn!(server = %self.config.server_uri, %err, "editor running without language server");
                if report {
                    let message = match err {
                        TransportError::UnsupportedScheme(scheme) => format!(
                            "Language server endpoint '{}' uses unsupported scheme '{scheme}'.",
                            self.config.server_uri
                        ),
                        err => format!(
                            "Language server connection to '{}' failed: {err}",
                            self.config.server_uri
                        ),
                    };
                    self.events.push(EditorEvent::ConnectionError(message));
                }
            }
        }
    }

    pub fn config(&self) -> &ResolvedEditorConfig {
        &self.config
    }

    pub fn value(&self) -> &str {
        self.document.text()
    }

    pub fn document(&self) -> &EditorDocument {
        &self.document
    }

    /// Replaces the whole document, notifying the host exactly like a user edit would.
    ///
    /// Diagnostics of the previous content are dropped, including any still in flight.
    pub fn set_value(&mut self, value: &str) {
        if self.disposed || value == self.document.text() {
            return;
        }
        self.discard_in_flight();
        self.suggestions = None;
        if !self.diagnostics.is_empty() {
            self.diagnostics.clear();
            self.events.push(EditorEvent::Lint(Vec::new()));
        }
        self.document.replace_all(value);
        self.document_changed();
    }

    /// Focuses the editor; `None` places the caret at the end of the document.
    pub fn focus(&mut self, offset: Option<usize>) {
        self.focused = true;
        let caret = offset.map_or(self.document.len(), |offset| offset.min(self.document.len()));
        self.document.set_cursor(caret);
    }

    pub fn blur(&mut self) {
        self.focused = false;
        self.suggestions = None;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn selection(&self) -> &Selection {
        self.document.selection()
    }

    /// Inserts text at the caret, replacing the selection.
    pub fn insert_text(&mut self, text: &str) {
        if self.disposed || self.config.read_only || text.is_empty() {
            return;
        }
        self.suggestions = None;
        self.document.insert(text);
        self.document_changed();
    }

    /// Removes the selected text. Returns false when nothing was selected.
    pub fn delete_selection(&mut self) -> bool {
        if self.disposed || self.config.read_only || self.document.selection().main().is_empty() {
            return false;
        }
        self.document.insert("");
        self.document_changed();
        true
    }

    pub fn placeholder(&self) -> &str {
        &self.config.placeholder
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn suggestions(&self) -> Option<&Suggestions> {
        self.suggestions.as_ref()
    }

    /// A suggestion list is showing.
    pub fn completion_active(&self) -> bool {
        self.suggestions.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drains server traffic and the connectivity probe.
    pub fn poll(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(probe) = self.probe.as_mut() {
            if let Some(message) = probe.poll() {
                warn!(server = %self.config.server_uri, "connectivity probe failed");
                self.events.push(EditorEvent::ConnectionError(message));
            }
            if probe.is_settled() {
                self.probe = None;
            }
        }
        while let Some(message) = self.client.as_mut().and_then(|client| client.try_recv()) {
            self.on_server_message(message);
        }
    }

    fn on_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Diagnostics {
                version,
                diagnostics,
            } => {
                if version.is_some_and(|version| version < self.version) {
                    return;
                }
                self.diagnostics = diagnostics.clone();
                self.events.push(EditorEvent::Lint(diagnostics));
            }
            ServerMessage::Completions(items) => {
                if !std::mem::take(&mut self.completion_requested) || !self.focused {
                    return;
                }
                self.suggestions = (!items.is_empty()).then_some(Suggestions { items, selected: 0 });
            }
        }
    }

    fn discard_in_flight(&mut self) {
        if let Some(client) = self.client.as_mut() {
            while client.try_recv().is_some() {}
        }
        self.completion_requested = false;
    }

    /// Handles a key while focused. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if self.disposed || !self.focused {
            return false;
        }
        if self.suggestions.is_some() && self.handle_suggestion_key(key) {
            return true;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char(' ') if ctrl => {
                self.request_completion();
                true
            }
            KeyCode::Char(_) if ctrl => false,
            KeyCode::Char(ch) => self.edit(|doc| {
                doc.insert(ch.encode_utf8(&mut [0; 4]));
                true
            }),
            KeyCode::Enter if self.config.line_numbers => self.edit(|doc| {
                doc.insert("\n");
                true
            }),
            KeyCode::Backspace => {
                if self.document.selection().at_document_start() {
                    self.events.push(EditorEvent::DemoteRequested);
                    return true;
                }
                self.edit(EditorDocument::delete_backward)
            }
            KeyCode::Delete => self.edit(EditorDocument::delete_forward),
            KeyCode::Left => self.navigate(EditorDocument::move_left),
            KeyCode::Right => self.navigate(EditorDocument::move_right),
            KeyCode::Home => self.navigate(EditorDocument::move_line_start),
            KeyCode::End => self.navigate(EditorDocument::move_line_end),
            KeyCode::Up if self.document.line_count() > 1 => {
                self.navigate(|doc| doc.move_vertical(-1))
            }
            KeyCode::Down if self.document.line_count() > 1 => {
                self.navigate(|doc| doc.move_vertical(1))
            }
            _ => false,
        }
    }

    fn handle_suggestion_key(&mut self, key: &KeyEvent) -> bool {
        let Some(suggestions) = self.suggestions.as_mut() else {
            return false;
        };
        let count = suggestions.items.len();
        match key.code {
            KeyCode::Esc => {
                self.suggestions = None;
                true
            }
            KeyCode::Up => {
                suggestions.selected = (suggestions.selected + count - 1) % count;
                true
            }
            KeyCode::Down => {
                suggestions.selected = (suggestions.selected + 1) % count;
                true
            }
            KeyCode::Enter | KeyCode::Tab => {
                self.accept_suggestion();
                true
            }
            _ => {
                self.suggestions = None;
                false
            }
        }
    }

    fn accept_suggestion(&mut self) {
        let Some(item) = self.suggestions.take().and_then(|list| {
            let selected = list.selected;
            list.items.into_iter().nth(selected)
        }) else {
            return;
        };
        let insert = item.insert_text.unwrap_or(item.label);
        let caret = self.document.caret();
        let word = self
            .document
            .text()
            .chars()
            .take(caret)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .take_while(|ch| ch.is_alphanumeric() || *ch == '_')
            .count();
        if self.config.read_only {
            return;
        }
        self.document.select(caret - word, caret);
        self.document.insert(&insert);
        self.document_changed();
    }

    fn request_completion(&mut self) {
        let position = self.lsp_position();
        let Some(client) = self.client.as_mut() else {
            return;
        };
        match client.request_completion(&self.config.document_uri, position) {
            Ok(()) => self.completion_requested = true,
            Err(err) => warn!(%err, "completion request failed"),
        }
    }

    /// Caret position in the wrapped text the server sees, in UTF-16 code units.
    fn lsp_position(&self) -> Position {
        let before: String = self.document.text().chars().take(self.document.caret()).collect();
        let wrapped = format!("{}{}", self.config.prefix, before);
        let line = wrapped.matches('\n').count();
        let last_line = wrapped.rsplit('\n').next().unwrap_or_default();
        Position {
            line: line as u32,
            character: last_line.encode_utf16().count() as u32,
        }
    }

    fn edit(&mut self, apply: impl FnOnce(&mut EditorDocument) -> bool) -> bool {
        if self.config.read_only {
            return true;
        }
        if apply(&mut self.document) {
            self.document_changed();
        }
        true
    }

    fn navigate(&mut self, apply: impl FnOnce(&mut EditorDocument)) -> bool {
        apply(&mut self.document);
        true
    }

    fn document_changed(&mut self) {
        self.version += 1;
        if let Some(client) = self.client.as_mut() {
            let text = self.config.wrap(self.document.text());
            if let Err(err) = client.did_change(&self.config.document_uri, self.version, &text) {
                warn!(uri = %self.config.document_uri, %err, "didChange failed");
            }
        }
        self.events
            .push(EditorEvent::Changed(self.document.text().to_string()));
    }

    /// Closes the connection. Safe to call repeatedly or when never connected.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.focused = false;
        self.probe = None;
        self.suggestions = None;
        self.diagnostics.clear();
        if let Some(mut client) = self.client.take() {
            client.close();
            debug!(server = %self.config.server_uri, "language server connection disposed");
        }
    }
}

impl Drop for StructuredEditorSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::transport::OfflineConnector;
    use crate::tests::support::{RecordingConnector, key};

    fn session(value: &str, connector: &RecordingConnector) -> StructuredEditorSession {
        StructuredEditorSession::open(
            &EditorConfig::new("feel", "tcp://127.0.0.1:9"),
            value,
            connector,
        )
        .expect("valid config")
    }

    #[test]
    fn construction_requires_language_and_server() {
        let config = EditorConfig {
            server_uri: Some("tcp://127.0.0.1:9".into()),
            ..EditorConfig::default()
        };
        let err = StructuredEditorSession::open(&config, "", &OfflineConnector).unwrap_err();
        assert_eq!(err, EditorError::MissingParameter("languageId"));
    }

    #[test]
    fn set_value_notifies_like_a_user_edit() {
        let connector = RecordingConnector::default();
        let mut editor = session("a", &connector);
        editor.set_value("a + b");
        assert_eq!(editor.take_events(), [EditorEvent::Changed("a + b".into())]);
        assert_eq!(connector.log().last().map(String::as_str), Some("change 2 a + b"));
    }

    #[test]
    fn focus_clamps_offsets() {
        let connector = RecordingConnector::default();
        let mut editor = session("abc", &connector);
        editor.focus(Some(10));
        assert_eq!(editor.document().caret(), 3);
        editor.focus(Some(1));
        assert_eq!(editor.document().caret(), 1);
        editor.focus(None);
        assert_eq!(editor.document().caret(), 3);
    }

    #[test]
    fn backspace_at_start_requests_demotion_without_editing() {
        let connector = RecordingConnector::default();
        let mut editor = session("x", &connector);
        editor.focus(Some(0));
        assert!(editor.handle_key(&key(KeyCode::Backspace)));
        assert_eq!(editor.take_events(), [EditorEvent::DemoteRequested]);
        assert_eq!(editor.value(), "x");
    }

    #[test]
    fn diagnostics_for_old_content_are_dropped_on_reset() {
        let connector = RecordingConnector::default();
        let mut editor = session("1 +", &connector);
        connector.push(ServerMessage::Diagnostics {
            version: Some(1),
            diagnostics: vec![crate::tests::support::error_diagnostic()],
        });
        editor.poll();
        assert!(has_error_diagnostic(editor.diagnostics()));
        editor.take_events();

        connector.push(ServerMessage::Diagnostics {
            version: None,
            diagnostics: vec![crate::tests::support::error_diagnostic()],
        });
        editor.set_value("1 + 2");
        editor.poll();
        assert!(editor.diagnostics().is_empty());
        assert_eq!(
            editor.take_events(),
            [EditorEvent::Lint(Vec::new()), EditorEvent::Changed("1 + 2".into())]
        );
    }

    #[test]
    fn completions_open_a_suggestion_list_and_accept_replaces_the_word() {
        let connector = RecordingConnector::default();
        let mut editor = session("su", &connector);
        editor.focus(None);
        assert!(editor.handle_key(&KeyEvent::new(KeyCode::Char(' '), KeyModifiers::CONTROL)));
        connector.push(ServerMessage::Completions(vec![
            CompletionItem::new_simple("sum".into(), "function".into()),
            CompletionItem::new_simple("substring".into(), "function".into()),
        ]));
        editor.poll();
        assert!(editor.completion_active());
        editor.handle_key(&key(KeyCode::Down));
        editor.handle_key(&key(KeyCode::Enter));
        assert_eq!(editor.value(), "substring");
        assert!(!editor.completion_active());
    }

    #[test]
    fn escape_closes_suggestions_only() {
        let connector = RecordingConnector::default();
        let mut editor = session("s", &connector);
        editor.focus(None);
        editor.handle_key(&KeyEvent::new(KeyCode::Char(' '), KeyModifiers::CONTROL));
        connector.push(ServerMessage::Completions(vec![CompletionItem::new_simple(
            "sum".into(),
            "function".into(),
        )]));
        editor.poll();
        assert!(editor.handle_key(&key(KeyCode::Esc)));
        assert!(!editor.completion_active());
        assert!(!editor.handle_key(&key(KeyCode::Esc)), "second escape is not consumed");
    }

    #[test]
    fn completion_position_accounts_for_the_prefix() {
        let connector = RecordingConnector::default();
        let config = EditorConfig::new("feel", "tcp://127.0.0.1:9")
            .with_wrapping(Some("{\n  x: ".into()), Some("\n}".into()));
        let mut editor = StructuredEditorSession::open(&config, "ab", &connector).expect("valid");
        editor.focus(None);
        assert_eq!(editor.lsp_position(), Position { line: 1, character: 7 });
    }

    #[test]
    fn dispose_closes_once_and_is_idempotent() {
        let connector = RecordingConnector::default();
        let mut editor = session("", &connector);
        editor.dispose();
        assert!(editor.is_disposed());
        editor.dispose();
        drop(editor);
        assert_eq!(connector.closed(), 1);

        let mut offline =
            StructuredEditorSession::open(&EditorConfig::new("feel", "ws://x"), "", &OfflineConnector)
                .expect("valid");
        offline.dispose();
        assert!(!offline.is_connected());
    }

    #[test]
    fn offline_session_reports_when_asked_to() {
        let config = EditorConfig::new("feel", "ws://127.0.0.1:9")
            .with_connection_errors(ConnectionErrors::Report);
        let mut editor = StructuredEditorSession::open(&config, "", &OfflineConnector).expect("valid");
        assert!(matches!(
            editor.take_events().as_slice(),
            [EditorEvent::ConnectionError(message)] if message.starts_with("Language server connection to 'ws://127.0.0.1:9/' failed")
        ));

        let quiet = EditorConfig::new("feel", "ws://127.0.0.1:9");
        let mut editor = StructuredEditorSession::open(&quiet, "", &OfflineConnector).expect("valid");
        assert!(editor.take_events().is_empty());
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    }

    fn poll_until(
        editor: &mut StructuredEditorSession,
        done: impl Fn(&StructuredEditorSession) -> bool,
    ) {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !done(editor) && std::time::Instant::now() < deadline {
            editor.poll();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }

    #[test]
    fn reachable_websocket_server_is_not_reported() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let config = EditorConfig::new("feel", format!("ws://127.0.0.1:{port}"))
            .with_connection_errors(ConnectionErrors::Report);
        let connector = crate::lsp::ServerConnector::new();
        let mut editor = StructuredEditorSession::open(&config, "", &connector).expect("valid");
        assert!(editor.is_connected());
        poll_until(&mut editor, |editor| editor.probe.is_none());
        assert!(editor.probe.is_none(), "connection check settled");
        assert!(
            !editor
                .take_events()
                .iter()
                .any(|event| matches!(event, EditorEvent::ConnectionError(_)))
        );
        editor.dispose();
        drop(listener);
    }

    #[test]
    fn unsupported_schemes_are_reported_as_such() {
        let config = EditorConfig::new("feel", "http://127.0.0.1:9")
            .with_connection_errors(ConnectionErrors::Report);
        let connector = crate::lsp::ServerConnector::new();
        let mut editor = StructuredEditorSession::open(&config, "", &connector).expect("valid");
        assert_eq!(
            editor.take_events(),
            [EditorEvent::ConnectionError(
                "Language server endpoint 'http://127.0.0.1:9/' uses unsupported scheme 'http'."
                    .into()
            )]
        );
    }

    #[test]
    fn connection_checks_finishing_after_dispose_are_ignored() {
        let port = closed_port();
        let config = EditorConfig::new("feel", format!("tcp://127.0.0.1:{port}"))
            .with_connection_errors(ConnectionErrors::Report);
        let connector = RecordingConnector::default();
        let mut disposed = StructuredEditorSession::open(&config, "", &connector).expect("valid");
        let mut live = StructuredEditorSession::open(&config, "", &connector).expect("valid");
        disposed.dispose();

        poll_until(&mut live, |editor| editor.probe.is_none());
        assert!(matches!(
            live.take_events().as_slice(),
            [EditorEvent::ConnectionError(_)]
        ));
        disposed.poll();
        assert!(disposed.take_events().is_empty());
    }
}
