//! Text and selection state of a structured editor. Offsets count characters.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub anchor: usize,
    pub head: usize,
}

impl SelectionRange {
    pub fn cursor(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub ranges: Vec<SelectionRange>,
    pub main: usize,
}

impl Selection {
    pub fn cursor(pos: usize) -> Self {
        Self {
            ranges: vec![SelectionRange::cursor(pos)],
            main: 0,
        }
    }

    pub fn main(&self) -> SelectionRange {
        self.ranges[self.main]
    }

    /// Caret sits at the very beginning of the document with nothing selected.
    pub fn at_document_start(&self) -> bool {
        let range = self.main();
        range.from() == 0 && range.to() == 0
    }
}

#[derive(Debug, Clone)]
pub struct EditorDocument {
    text: String,
    selection: Selection,
}

impl EditorDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            selection: Selection::cursor(0),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn caret(&self) -> usize {
        self.selection.main().head
    }

    /// Replaces the whole document. The caret keeps its offset where possible.
    pub fn replace_all(&mut self, text: impl Into<String>) {
        self.text = text.into();
        let caret = self.caret().min(self.len());
        self.selection = Selection::cursor(caret);
    }

    pub fn set_cursor(&mut self, pos: usize) {
        self.selection = Selection::cursor(pos.min(self.len()));
    }

    pub fn select(&mut self, anchor: usize, head: usize) {
        let len = self.len();
        self.selection = Selection {
            ranges: vec![SelectionRange {
                anchor: anchor.min(len),
                head: head.min(len),
            }],
            main: 0,
        };
    }

    pub fn selected_text(&self) -> &str {
        let range = self.selection.main();
        let start = self.byte_index(range.from());
        let end = self.byte_index(range.to());
        &self.text[start..end]
    }

    pub fn insert(&mut self, inserted: &str) {
        let range = self.selection.main();
        let start = self.byte_index(range.from());
        let end = self.byte_index(range.to());
        self.text.replace_range(start..end, inserted);
        self.set_cursor(range.from() + inserted.chars().count());
    }

    pub fn delete_backward(&mut self) -> bool {
        let range = self.selection.main();
        if !range.is_empty() {
            self.insert("");
            return true;
        }
        if range.head == 0 {
            return false;
        }
        self.select(range.head - 1, range.head);
        self.insert("");
        true
    }

    pub fn delete_forward(&mut self) -> bool {
        let range = self.selection.main();
        if !range.is_empty() {
            self.insert("");
            return true;
        }
        if range.head >= self.len() {
            return false;
        }
        self.select(range.head, range.head + 1);
        self.insert("");
        true
    }

    pub fn move_left(&mut self) {
        let range = self.selection.main();
        let target = if range.is_empty() {
            range.head.saturating_sub(1)
        } else {
            range.from()
        };
        self.set_cursor(target);
    }

    pub fn move_right(&mut self) {
        let range = self.selection.main();
        let target = if range.is_empty() {
            range.head + 1
        } else {
            range.to()
        };
        self.set_cursor(target);
    }

    pub fn move_line_start(&mut self) {
        let (line, _) = self.line_col(self.caret());
        self.set_cursor(self.line_start(line));
    }

    pub fn move_line_end(&mut self) {
        let (line, _) = self.line_col(self.caret());
        let start = self.line_start(line);
        let width = self.line_width(line);
        self.set_cursor(start + width);
    }

    pub fn move_vertical(&mut self, delta: isize) {
        let (line, col) = self.line_col(self.caret());
        let last = self.line_count().saturating_sub(1);
        let target = line.saturating_add_signed(delta).min(last);
        if target == line {
            return;
        }
        let col = col.min(self.line_width(target));
        self.set_cursor(self.line_start(target) + col);
    }

    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    /// Zero-based line and column of a character offset.
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        let mut line = 0;
        let mut col = 0;
        for ch in self.text.chars().take(pos) {
            if ch == '\n' {
                line += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    fn line_start(&self, line: usize) -> usize {
        self.lines()
            .take(line)
            .map(|text| text.chars().count() + 1)
            .sum()
    }

    fn line_width(&self, line: usize) -> usize {
        self.lines()
            .nth(line)
            .map(|text| text.chars().count())
            .unwrap_or(0)
    }

    fn byte_index(&self, pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(pos)
            .map(|(index, _)| index)
            .unwrap_or(self.text.len())
    }
}
