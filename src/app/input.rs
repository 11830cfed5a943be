use std::sync::Arc;

use crossterm::event::KeyEvent;

use super::keymap::{KeymapContext, KeymapStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Save,
    Quit,
    Dismiss,
    FieldStep(i32),
    ElementStep(i32),
    ToggleExpression,
    OpenPopup,
    ClosePopup,
    Copy,
    Cut,
    Paste,
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Action(KeyAction),
    /// Not bound; goes to the focused editing surface.
    Input(KeyEvent),
}

#[derive(Debug, Clone)]
pub(crate) struct InputRouter {
    keymap: Arc<KeymapStore>,
}

impl InputRouter {
    pub(crate) fn new(keymap: Arc<KeymapStore>) -> Self {
        Self { keymap }
    }

    pub(crate) fn route(&self, key: &KeyEvent, context: KeymapContext) -> Dispatch {
        match self.keymap.classify(key, context) {
            Some(action) => Dispatch::Action(action),
            None => Dispatch::Input(*key),
        }
    }

    pub(crate) fn help_text(&self, context: KeymapContext) -> Option<String> {
        self.keymap.help_text(context)
    }
}
