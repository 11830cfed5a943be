use crossterm::event::{KeyCode, KeyEvent};

/// Two-phase Escape handling for the popup.
///
/// The capture phase runs before the editor sees the key and records whether a suggestion list
/// was showing. The bubble phase, after the editor handled the key, closes the popup only when no
/// suggestion list was showing at capture time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscapeGuard {
    completion_open: bool,
}

impl EscapeGuard {
    pub fn capture(&mut self, key: &KeyEvent, completion_active: bool) {
        if key.code == KeyCode::Esc {
            self.completion_open = completion_active;
        }
    }

    pub fn should_close(&mut self, key: &KeyEvent) -> bool {
        key.code == KeyCode::Esc && !std::mem::take(&mut self.completion_open)
    }
}
