use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::event::KeyEvent;
use lsp_types::Diagnostic;
use ratatui::layout::Position;
use tracing::{debug, warn};

use crate::domain::codec::{self, Classified, EditMode};
use crate::domain::{FieldDefinition, FieldId};
use crate::lsp::{
    EditorConfig, EditorError, EditorEvent, LanguageConnector, ResolvedEditorConfig,
    StructuredEditorSession, has_error_diagnostic,
};
use crate::popup::PopupConfig;

use super::binding::{PropertyBinding, Validate};
use super::clipboard::{ClipboardData, expression_format};
use super::debounce::Debouncer;
use super::error::{ErrorSlots, SYNTAX_ERROR_MESSAGE};
use super::focus::{FocusCoordinator, FocusRequest, FocusTarget};
use super::surface::{PlainInput, Surface};

/// Zero-delay steps run at the start of the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    PromoteAfterPaste,
}

/// Edit state of one property field that can switch between plain text and an expression.
///
/// The raw buffer holds the encoded value: plain text as is, expressions behind the sentinel.
/// An empty buffer stands for "no value". Edits update the buffer at once and reach the
/// [`PropertyBinding`] through a debounced commit driven by [`tick`](Self::tick).
pub struct ExpressionFieldController {
    field: FieldDefinition,
    /// Checked lazily: only an expression surface needs a language and a server.
    editor_config: Result<ResolvedEditorConfig, EditorError>,
    connector: Rc<dyn LanguageConnector>,
    validator: Option<Rc<dyn Validate>>,
    mode: EditMode,
    buffer: String,
    surface: Surface,
    mounted: bool,
    focus: FocusCoordinator,
    commit: Debouncer<String>,
    errors: ErrorSlots,
    deferred: Vec<Deferred>,
    connection_error: Option<String>,
    popup_owned: bool,
}

impl std::fmt::Debug for ExpressionFieldController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionFieldController")
            .field("field", &self.field.id)
            .field("mode", &self.mode)
            .field("buffer", &self.buffer)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl ExpressionFieldController {
    /// Mounts the field. Fails when the field starts in expression mode and its language
    /// settings lack a language id or server.
    pub fn new(
        field: FieldDefinition,
        initial: Option<&str>,
        connector: Rc<dyn LanguageConnector>,
        debounce: Duration,
    ) -> Result<Self, EditorError> {
        let editor_config = EditorConfig::from_settings(&field.language)
            .with_placeholder(field.placeholder.clone())
            .with_read_only(field.disabled)
            .resolve();
        let mut initial = codec::classify(initial);
        if field.expression.is_required() && !initial.mode.is_expression() {
            initial = Classified::expression(initial.display);
        }
        if initial.mode.is_expression() {
            if let Err(err) = &editor_config {
                return Err(err.clone());
            }
        }
        let surface = Surface::Plain(PlainInput::default());
        let mut controller = Self {
            mode: initial.mode,
            buffer: initial.encode(),
            surface,
            mounted: false,
            focus: FocusCoordinator::new(),
            commit: Debouncer::new(debounce),
            errors: ErrorSlots::default(),
            deferred: Vec::new(),
            connection_error: None,
            popup_owned: false,
            validator: None,
            connector,
            editor_config,
            field,
        };
        controller.surface = controller.mount_surface(&initial.display);
        controller.revalidate();
        Ok(controller)
    }

    pub fn with_validator(mut self, validator: Rc<dyn Validate>) -> Self {
        self.validator = Some(validator);
        self.revalidate();
        self
    }

    pub fn id(&self) -> &FieldId {
        &self.field.id
    }

    pub fn field(&self) -> &FieldDefinition {
        &self.field
    }

    /// Resolved language settings; `None` when the field has no language configured.
    pub fn editor_config(&self) -> Option<&ResolvedEditorConfig> {
        self.editor_config.as_ref().ok()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Encoded local value, possibly ahead of the committed one.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Text shown in the active surface.
    pub fn display(&self) -> &str {
        match self.mode {
            EditMode::Expression => codec::strip_sentinel(&self.buffer),
            EditMode::Plain => &self.buffer,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn errors(&self) -> &ErrorSlots {
        &self.errors
    }

    pub fn displayed_error(&self) -> Option<&str> {
        self.errors.displayed()
    }

    pub fn connection_error(&self) -> Option<&str> {
        self.connection_error.as_deref()
    }

    pub fn has_pending_commit(&self) -> bool {
        self.commit.is_pending()
    }

    pub fn pending_focus(&self) -> FocusRequest {
        self.focus.pending()
    }

    /// The inline editor shows suggestions and claims navigation keys.
    pub fn completion_active(&self) -> bool {
        matches!(&self.surface, Surface::Structured(editor) if editor.completion_active())
    }

    pub fn is_popup_owned(&self) -> bool {
        self.popup_owned
    }

    /// Whether the mode switch is available: pinned and disabled fields cannot toggle, and
    /// neither can fields without a language to edit expressions in.
    pub fn can_toggle(&self) -> bool {
        !self.field.disabled && !self.field.expression.is_required() && self.editor_config.is_ok()
    }

    pub fn can_open_popup(&self) -> bool {
        self.mode.is_expression() && !self.field.disabled
    }

    fn mount_surface(&self, display: &str) -> Surface {
        match (self.mode, &self.editor_config) {
            (EditMode::Expression, Ok(config)) => Surface::Structured(Box::new(
                StructuredEditorSession::with_resolved(
                    config.clone(),
                    display,
                    self.connector.as_ref(),
                ),
            )),
            _ => {
                let input =
                    PlainInput::new(display, self.field.placeholder.clone().unwrap_or_default());
                Surface::Plain(if self.field.multiline {
                    input.text_area(self.field.auto_resize)
                } else {
                    input
                })
            }
        }
    }

    fn remount(&mut self, display: &str) {
        self.surface.dispose();
        self.surface = self.mount_surface(display);
        self.mounted = false;
        self.focus.surface_unmounted();
        self.errors.local = None;
    }

    /// Brings the mounted surface in line with the buffer without emitting a new edit.
    fn sync_surface(&mut self) {
        let display = self.display().to_string();
        match &mut self.surface {
            Surface::Plain(input) => {
                if input.value() != display {
                    input.set_value(&display);
                }
            }
            Surface::Structured(editor) => editor.set_value(&display),
        }
    }

    /// Requests focus; it is applied right away when the surface is mounted, otherwise once it
    /// becomes ready.
    pub fn focus(&mut self, target: FocusTarget) {
        if let Some(target) = self.focus.request(target) {
            self.surface.apply_focus(target);
        }
    }

    pub fn blur(&mut self) {
        self.surface.blur();
    }

    /// A user edit of the displayed text.
    pub fn on_local_edit(&mut self, display: &str, now: Instant) {
        let raw = codec::encode(self.mode, display);
        if raw == self.buffer {
            return;
        }
        self.buffer = raw;
        self.commit.schedule(self.buffer.clone(), now);
        self.sync_surface();
    }

    /// Flips between plain and expression mode. Returns false when the switch is unavailable.
    pub fn toggle_mode(&mut self, now: Instant) -> bool {
        if !self.can_toggle() {
            return false;
        }
        let display = self.display().to_string();
        let (mode, target) = match self.mode {
            EditMode::Plain => (
                EditMode::Expression,
                FocusTarget::Offset(display.chars().count() + 1),
            ),
            EditMode::Expression => (EditMode::Plain, FocusTarget::Start),
        };
        debug!(field = %self.field.id, ?mode, "toggling field mode");
        self.mode = mode;
        self.buffer = codec::encode(mode, &display);
        self.commit.schedule(self.buffer.clone(), now);
        self.remount(&display);
        self.focus(target);
        true
    }

    /// A value arrived from outside, e.g. undo. The outside value wins, except that clearing an
    /// expression keeps the field in expression mode.
    pub fn sync_external(&mut self, value: Option<&str>) {
        let raw = value.unwrap_or_default();
        if raw == self.buffer {
            return;
        }
        self.commit.cancel();
        let next = if raw.is_empty() && self.mode.is_expression() {
            Classified::expression("")
        } else {
            let classified = codec::classify(Some(raw));
            if self.field.expression.is_required() && !classified.mode.is_expression() {
                Classified::expression(classified.display)
            } else if classified.mode.is_expression() && self.editor_config.is_err() {
                warn!(field = %self.field.id, "no language for expression value, keeping it as text");
                Classified::plain(raw)
            } else {
                classified
            }
        };
        let mode_changed = next.mode != self.mode;
        self.mode = next.mode;
        self.buffer = next.encode();
        if mode_changed {
            self.remount(&next.display);
        } else {
            self.sync_surface();
        }
        self.revalidate();
    }

    pub fn handle_key(&mut self, key: &KeyEvent, now: Instant) -> bool {
        if self.field.disabled {
            return false;
        }
        let consumed = match &mut self.surface {
            Surface::Plain(input) => {
                let before = input.value().to_string();
                let consumed = input.handle_key(key);
                if input.value() != before {
                    let edited = input.value().to_string();
                    self.on_local_edit(&edited, now);
                }
                consumed
            }
            Surface::Structured(editor) => editor.handle_key(key),
        };
        self.drain_editor(now);
        consumed
    }

    /// Copies the selection, or the whole value when nothing is selected. Expressions are also
    /// stored under the language's clipboard format.
    pub fn on_copy(&self, data: &mut ClipboardData) {
        let text = match &self.surface {
            Surface::Structured(editor) if !editor.selection().main().is_empty() => {
                editor.document().selected_text().to_string()
            }
            _ => self.display().to_string(),
        };
        if let (true, Some(format)) = (self.mode.is_expression(), self.expression_format()) {
            data.set_data(format, text.clone());
        }
        data.set_text(text);
    }

    pub fn on_cut(&mut self, data: &mut ClipboardData, now: Instant) {
        self.on_copy(data);
        if self.field.disabled {
            return;
        }
        match &mut self.surface {
            Surface::Structured(editor) => {
                if !editor.delete_selection() {
                    editor.set_value("");
                }
            }
            Surface::Plain(input) => {
                input.clear();
                self.on_local_edit("", now);
            }
        }
        self.drain_editor(now);
    }

    /// Inserts clipboard text. Pasting a copied expression into a plain field promotes the field
    /// to expression mode on the next tick, after the plain value was updated.
    pub fn on_paste(&mut self, data: &ClipboardData, now: Instant) -> bool {
        if self.field.disabled {
            return false;
        }
        let format = self.expression_format();
        let Some(text) = data
            .text()
            .or_else(|| format.as_deref().and_then(|format| data.data(format)))
        else {
            return false;
        };
        let text = text.to_string();
        match &mut self.surface {
            Surface::Plain(input) => {
                input.insert(&text);
                let edited = input.value().to_string();
                self.on_local_edit(&edited, now);
                if format.as_deref().is_some_and(|format| data.has_format(format)) {
                    self.deferred.push(Deferred::PromoteAfterPaste);
                }
            }
            Surface::Structured(editor) => editor.insert_text(&text),
        }
        self.drain_editor(now);
        true
    }

    fn expression_format(&self) -> Option<String> {
        self.editor_config
            .as_ref()
            .ok()
            .map(|config| expression_format(&config.language_id))
    }

    /// Signal keyed by field identity; other fields ignore it.
    pub fn set_temporary_error(&mut self, field: &FieldId, message: Option<String>) {
        if *field == self.field.id {
            self.errors.temporary = message;
        }
    }

    pub fn on_lint(&mut self, diagnostics: &[Diagnostic]) {
        self.errors.local = has_error_diagnostic(diagnostics).then(|| SYNTAX_ERROR_MESSAGE.to_string());
    }

    /// Applies an event from the inline editor or from the popup editing this field.
    pub fn apply_editor_event(&mut self, event: EditorEvent, now: Instant) {
        match event {
            EditorEvent::Changed(display) => self.on_local_edit(&display, now),
            EditorEvent::Lint(diagnostics) => self.on_lint(&diagnostics),
            EditorEvent::ConnectionError(message) => {
                warn!(field = %self.field.id, %message, "language server unavailable");
                self.connection_error = Some(message);
            }
            EditorEvent::DemoteRequested => {
                self.toggle_mode(now);
            }
        }
    }

    fn drain_editor(&mut self, now: Instant) {
        let Surface::Structured(editor) = &mut self.surface else {
            return;
        };
        editor.poll();
        for event in editor.take_events() {
            let remounts = matches!(event, EditorEvent::DemoteRequested);
            self.apply_editor_event(event, now);
            if remounts && !self.surface.is_structured() {
                // Anything left came from the editor that was just disposed.
                break;
            }
        }
    }

    /// Advances mount effects, deferred steps, editor traffic and the debounced commit.
    pub fn tick(&mut self, now: Instant, binding: &mut dyn PropertyBinding) {
        if !self.mounted {
            self.mounted = true;
            if let Some(target) = self.focus.surface_ready() {
                self.surface.apply_focus(target);
            }
        }
        for step in std::mem::take(&mut self.deferred) {
            match step {
                Deferred::PromoteAfterPaste => {
                    if !self.mode.is_expression() && self.toggle_mode(now) {
                        self.focus(FocusTarget::End);
                    }
                }
            }
        }
        self.drain_editor(now);
        if let Some(raw) = self.commit.poll(now) {
            self.commit_value(&raw, binding);
        }
    }

    /// Commits a pending edit right away.
    pub fn flush(&mut self, binding: &mut dyn PropertyBinding) -> bool {
        match self.commit.flush() {
            Some(raw) => self.commit_value(&raw, binding),
            None => false,
        }
    }

    fn commit_value(&mut self, raw: &str, binding: &mut dyn PropertyBinding) -> bool {
        let value = codec::committed_value(raw);
        if binding.get_value(&self.field.id) == value {
            return false;
        }
        let error = self.validate(value.as_deref());
        self.errors.validation = error.clone();
        debug!(field = %self.field.id, ?value, "committing field value");
        binding.set_value(&self.field.id, value, error);
        true
    }

    fn validate(&self, value: Option<&str>) -> Option<String> {
        self.validator
            .as_ref()
            .and_then(|validator| validator.validate(value))
    }

    fn revalidate(&mut self) {
        let value = codec::committed_value(&self.buffer);
        self.errors.validation = self.validate(value.as_deref());
    }

    pub fn set_popup_owned(&mut self, owned: bool) {
        self.popup_owned = owned;
        if owned {
            self.surface.blur();
        }
    }

    /// Parameters snapshot for opening this field in the popup; `None` without a language.
    pub fn popup_config(
        &self,
        element_kind: Option<&str>,
        anchor: Option<Position>,
    ) -> Option<PopupConfig> {
        let editor = self.editor_config.as_ref().ok()?;
        Some(PopupConfig {
            title: format!(
                "{} / {}",
                element_kind.unwrap_or("Element"),
                self.field.label
            ),
            value: self.display().to_string(),
            anchor,
            editor: editor.clone().with_line_numbers(true),
            links: Vec::new(),
        })
    }

    /// Tears the field down: closes the editor connection and drops buffered focus and any
    /// pending commit.
    pub fn unmount(&mut self) {
        self.surface.dispose();
        self.focus.cancel();
        if self.commit.is_pending() {
            debug!(field = %self.field.id, "discarding pending commit on unmount");
        }
        self.commit.cancel();
        self.deferred.clear();
    }
}
