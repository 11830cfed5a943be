use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::focus::FocusTarget;
use crate::lsp::StructuredEditorSession;

/// Height of a text area that does not grow with its content.
pub const TEXT_AREA_ROWS: usize = 2;

/// Text input used while a field is in plain mode: a single line, or a text area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainInput {
    text: String,
    caret: usize,
    placeholder: String,
    focused: bool,
    multiline: bool,
    auto_resize: bool,
}

impl PlainInput {
    pub fn new(text: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            caret: 0,
            placeholder: placeholder.into(),
            focused: false,
            multiline: false,
            auto_resize: false,
        }
    }

    /// Turns the input into a text area; `auto_resize` sizes it to the line count.
    pub fn text_area(mut self, auto_resize: bool) -> Self {
        self.multiline = true;
        self.auto_resize = auto_resize;
        self
    }

    pub fn is_multiline(&self) -> bool {
        self.multiline
    }

    /// Rows the input occupies on screen.
    pub fn rows(&self) -> usize {
        match (self.multiline, self.auto_resize) {
            (false, _) => 1,
            (true, true) => self.text.split('\n').count(),
            (true, false) => TEXT_AREA_ROWS,
        }
    }

    /// Zero-based line and column of the caret.
    pub fn caret_line_col(&self) -> (usize, usize) {
        let before: String = self.text.chars().take(self.caret).collect();
        let line = before.matches('\n').count();
        let column = before.rsplit('\n').next().unwrap_or_default().chars().count();
        (line, column)
    }

    pub fn value(&self) -> &str {
        &self.text
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn focus(&mut self, target: FocusTarget) {
        self.focused = true;
        self.caret = target.resolve(self.len());
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Replaces the text; the caret stays put when it still fits.
    pub fn set_value(&mut self, text: &str) {
        self.text = text.to_string();
        self.caret = self.caret.min(self.len());
    }

    /// Inserts at the caret. Line breaks are kept only by text areas.
    pub fn insert(&mut self, inserted: &str) {
        let multiline = self.multiline;
        let kept: String = inserted
            .chars()
            .filter(|ch| *ch != '\r' && (multiline || *ch != '\n'))
            .collect();
        let at = self.byte_index(self.caret);
        self.text.insert_str(at, &kept);
        self.caret += kept.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.caret = 0;
    }

    /// Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return false;
        }
        match key.code {
            KeyCode::Char(ch) => {
                self.insert(ch.encode_utf8(&mut [0; 4]));
                true
            }
            KeyCode::Backspace if self.caret > 0 => {
                self.caret -= 1;
                let at = self.byte_index(self.caret);
                self.text.remove(at);
                true
            }
            KeyCode::Delete if self.caret < self.len() => {
                let at = self.byte_index(self.caret);
                self.text.remove(at);
                true
            }
            KeyCode::Left => {
                self.caret = self.caret.saturating_sub(1);
                true
            }
            KeyCode::Right => {
                self.caret = (self.caret + 1).min(self.len());
                true
            }
            KeyCode::Enter if self.multiline => {
                self.insert("\n");
                true
            }
            KeyCode::Up if self.multiline => self.move_line(-1),
            KeyCode::Down if self.multiline => self.move_line(1),
            KeyCode::Home => {
                let (line, _) = self.caret_line_col();
                self.caret = if self.multiline { self.offset_of(line, 0) } else { 0 };
                true
            }
            KeyCode::End => {
                let (line, _) = self.caret_line_col();
                self.caret = if self.multiline {
                    self.offset_of(line, usize::MAX)
                } else {
                    self.len()
                };
                true
            }
            _ => false,
        }
    }

    /// Moves the caret up or down a line. Leaving the first or last line is not consumed.
    fn move_line(&mut self, delta: isize) -> bool {
        let (line, column) = self.caret_line_col();
        let last = self.text.split('\n').count() - 1;
        let Some(target) = line.checked_add_signed(delta).filter(|target| *target <= last) else {
            return false;
        };
        self.caret = self.offset_of(target, column);
        true
    }

    /// Caret offset of `column` on `line`, clamped to the line's end.
    fn offset_of(&self, line: usize, column: usize) -> usize {
        let mut offset = 0;
        for (index, text) in self.text.split('\n').enumerate() {
            let width = text.chars().count();
            if index == line {
                return offset + column.min(width);
            }
            offset += width + 1;
        }
        self.len()
    }

    fn byte_index(&self, pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(pos)
            .map_or(self.text.len(), |(index, _)| index)
    }
}

/// Editing surface currently mounted for a field.
#[derive(Debug)]
pub enum Surface {
    Plain(PlainInput),
    Structured(Box<StructuredEditorSession>),
}

impl Surface {
    pub fn is_structured(&self) -> bool {
        matches!(self, Surface::Structured(_))
    }

    pub fn apply_focus(&mut self, target: FocusTarget) {
        match self {
            Surface::Plain(input) => input.focus(target),
            Surface::Structured(editor) => {
                let len = editor.document().len();
                editor.focus(Some(target.resolve(len)));
            }
        }
    }

    pub fn blur(&mut self) {
        match self {
            Surface::Plain(input) => input.blur(),
            Surface::Structured(editor) => editor.blur(),
        }
    }

    pub fn is_focused(&self) -> bool {
        match self {
            Surface::Plain(input) => input.is_focused(),
            Surface::Structured(editor) => editor.is_focused(),
        }
    }

    pub fn dispose(&mut self) {
        if let Surface::Structured(editor) = self {
            editor.dispose();
        }
    }
}
