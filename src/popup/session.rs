use crossterm::event::KeyEvent;
use ratatui::layout::Position;
use tracing::debug;

use crate::domain::{FieldId, PopupLink};
use crate::form::{FocusCoordinator, FocusTarget};
use crate::lsp::{EditorEvent, LanguageConnector, ResolvedEditorConfig, StructuredEditorSession};

use super::escape::EscapeGuard;
use super::events::{EventBus, PopupEvent, PopupHandle, PopupRequest};

/// Popup size in terminal cells.
pub const POPUP_WIDTH: u16 = 80;
pub const POPUP_HEIGHT: u16 = 14;

/// Snapshot of a field's editing parameters taken when its popup opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupConfig {
    pub title: String,
    pub value: String,
    /// Screen position of the field that opened the popup.
    pub anchor: Option<Position>,
    pub editor: ResolvedEditorConfig,
    /// Reference links shown next to the title.
    pub links: Vec<PopupLink>,
}

#[derive(Debug)]
struct OpenPopup {
    field: FieldId,
    config: PopupConfig,
    source: FieldId,
    handle: PopupHandle,
    editor: StructuredEditorSession,
    focus: FocusCoordinator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupKeyOutcome {
    Ignored,
    Consumed,
    Closed,
}

/// The one detached editing surface of a panel.
///
/// At most one field owns the popup; opening it for another field closes the current one first.
/// `Open` and `Close` notifications fire synchronously, `Opened` and `Closed` on the next
/// [`tick`](Self::tick) once the surface actually mounted or unmounted.
#[derive(Debug, Default)]
pub struct PopupSession {
    open: Option<OpenPopup>,
    bus: EventBus,
    next_handle: u64,
    deferred: Vec<PopupEvent>,
    return_focus: Option<FieldId>,
    escape: EscapeGuard,
}

impl PopupSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn open_field(&self) -> Option<&FieldId> {
        self.open.as_ref().map(|open| &open.field)
    }

    pub fn is_open_for(&self, field: &FieldId) -> bool {
        self.open_field() == Some(field)
    }

    pub fn config(&self) -> Option<&PopupConfig> {
        self.open.as_ref().map(|open| &open.config)
    }

    /// Field focus returns to once the popup closes.
    pub fn source(&self) -> Option<&FieldId> {
        self.open.as_ref().map(|open| &open.source)
    }

    pub fn editor(&self) -> Option<&StructuredEditorSession> {
        self.open.as_ref().map(|open| &open.editor)
    }

    pub fn open(
        &mut self,
        field: FieldId,
        config: PopupConfig,
        return_focus: FieldId,
        connector: &dyn LanguageConnector,
    ) {
        if self.open.is_some() {
            // Superseded popups do not hand focus back.
            self.teardown();
        }
        self.bus.fire(&PopupEvent::Open {
            field: field.clone(),
        });
        let handle = PopupHandle(self.next_handle);
        self.next_handle += 1;
        let editor =
            StructuredEditorSession::with_resolved(config.editor.clone(), &config.value, connector);
        let mut focus = FocusCoordinator::new();
        focus.request(FocusTarget::End);
        debug!(%field, %handle, "popup opening");
        self.deferred.push(PopupEvent::Opened {
            field: field.clone(),
            root: handle,
        });
        self.open = Some(OpenPopup {
            field,
            config,
            source: return_focus,
            handle,
            editor,
            focus,
        });
        self.bus.set_popup_open(true);
    }

    /// Closes the popup. A field that does not own the popup leaves it untouched.
    pub fn close(&mut self, field: Option<&FieldId>) -> bool {
        match (&self.open, field) {
            (None, _) => false,
            (Some(open), Some(field)) if open.field != *field => false,
            (Some(_), _) => {
                if let Some(source) = self.teardown() {
                    self.return_focus = Some(source);
                }
                true
            }
        }
    }

    /// The edited document element changed identity.
    pub fn element_changed(&mut self) -> bool {
        self.close(None)
    }

    pub fn handle_request(
        &mut self,
        request: PopupRequest,
        connector: &dyn LanguageConnector,
    ) -> bool {
        match request {
            PopupRequest::Open {
                field,
                config,
                return_focus,
            } => {
                self.open(field, config, return_focus, connector);
                true
            }
            PopupRequest::Close { field } => self.close(field.as_ref()),
            PopupRequest::IsOpen => self.is_open(),
        }
    }

    fn teardown(&mut self) -> Option<FieldId> {
        let mut open = self.open.take()?;
        self.bus.fire(&PopupEvent::Close {
            field: open.field.clone(),
            root: open.handle,
        });
        open.editor.dispose();
        self.bus.set_popup_open(false);
        debug!(field = %open.field, handle = %open.handle, "popup closing");
        // A popup torn down before its mount tick never announces `Opened`.
        self.deferred.retain(
            |event| !matches!(event, PopupEvent::Opened { root, .. } if *root == open.handle),
        );
        self.deferred.push(PopupEvent::Closed {
            field: open.field.clone(),
        });
        self.escape = EscapeGuard::default();
        Some(open.source)
    }

    /// Field that should receive focus after a close, taken once.
    pub fn take_return_focus(&mut self) -> Option<FieldId> {
        self.return_focus.take()
    }

    /// Runs the mount and unmount effects queued since the last tick and drains the editor.
    pub fn tick(&mut self) -> Vec<EditorEvent> {
        for event in std::mem::take(&mut self.deferred) {
            if let PopupEvent::Opened { root, .. } = &event {
                if let Some(open) = self.open.as_mut().filter(|open| open.handle == *root) {
                    if let Some(target) = open.focus.surface_ready() {
                        let len = open.editor.document().len();
                        open.editor.focus(Some(target.resolve(len)));
                    }
                }
            }
            self.bus.fire(&event);
        }
        self.take_editor_events()
    }

    pub fn take_editor_events(&mut self) -> Vec<EditorEvent> {
        match self.open.as_mut() {
            Some(open) => {
                open.editor.poll();
                open.editor.take_events()
            }
            None => Vec::new(),
        }
    }

    /// Pushes an externally changed value into the popup editor of `field`.
    pub fn sync_value(&mut self, field: &FieldId, value: &str) {
        if let Some(open) = self.open.as_mut().filter(|open| open.field == *field) {
            open.config.value = value.to_string();
            open.editor.set_value(value);
        }
    }

    /// Inserts pasted text at the popup editor's caret.
    pub fn insert_text(&mut self, text: &str) -> bool {
        match self.open.as_mut() {
            Some(open) if !open.editor.config().read_only => {
                open.editor.insert_text(text);
                true
            }
            _ => false,
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> PopupKeyOutcome {
        let Some(open) = self.open.as_mut() else {
            return PopupKeyOutcome::Ignored;
        };
        self.escape.capture(key, open.editor.completion_active());
        let consumed = open.editor.handle_key(key);
        if self.escape.should_close(key) {
            self.close(None);
            return PopupKeyOutcome::Closed;
        }
        if consumed {
            PopupKeyOutcome::Consumed
        } else {
            PopupKeyOutcome::Ignored
        }
    }
}
