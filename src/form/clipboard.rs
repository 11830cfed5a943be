use indexmap::IndexMap;

pub const TEXT_FORMAT: &str = "text/plain";

/// Clipboard format under which expressions of `language_id` are exchanged.
pub fn expression_format(language_id: &str) -> String {
    format!("application/{language_id}")
}

/// Multi-format clipboard payload, shaped like a browser `DataTransfer`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardData {
    formats: IndexMap<String, String>,
}

impl ClipboardData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        let mut data = Self::new();
        data.set_text(text);
        data
    }

    pub fn set_data(&mut self, format: impl Into<String>, data: impl Into<String>) {
        self.formats.insert(format.into(), data.into());
    }

    pub fn data(&self, format: &str) -> Option<&str> {
        self.formats.get(format).map(String::as_str)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.set_data(TEXT_FORMAT, text);
    }

    pub fn text(&self) -> Option<&str> {
        self.data(TEXT_FORMAT)
    }

    pub fn has_format(&self, format: &str) -> bool {
        self.data(format).is_some_and(|data| !data.is_empty())
    }

    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.formats.clear();
    }
}
