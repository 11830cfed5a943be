//! Classification of raw field values into plain text or sentinel-prefixed expressions.
//!
//! A raw value starting with [`SENTINEL`] is always an expression. The bare sentinel is the empty
//! expression, never the literal string `"="`.
//!
//! A plain display value that itself starts with the sentinel cannot be represented: encoding it
//! yields a raw value that classifies as an expression. Such values are committed verbatim and
//! promoted when [`classify`] reads them back, which the field controller does on mount and on
//! every external value change.

/// Prefix marking a raw value as an expression.
pub const SENTINEL: char = '=';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EditMode {
    #[default]
    Plain,
    Expression,
}

impl EditMode {
    pub fn is_expression(self) -> bool {
        matches!(self, EditMode::Expression)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub mode: EditMode,
    pub display: String,
}

impl Classified {
    pub fn plain(display: impl Into<String>) -> Self {
        Self {
            mode: EditMode::Plain,
            display: display.into(),
        }
    }

    pub fn expression(display: impl Into<String>) -> Self {
        Self {
            mode: EditMode::Expression,
            display: display.into(),
        }
    }

    pub fn encode(&self) -> String {
        encode(self.mode, &self.display)
    }
}

pub fn is_expression(raw: &str) -> bool {
    raw.starts_with(SENTINEL)
}

pub fn classify(raw: Option<&str>) -> Classified {
    match raw {
        Some(text) if is_expression(text) => Classified::expression(&text[SENTINEL.len_utf8()..]),
        Some(text) => Classified::plain(text),
        None => Classified::plain(String::new()),
    }
}

pub fn encode(mode: EditMode, display: &str) -> String {
    match mode {
        EditMode::Expression => {
            let mut raw = String::with_capacity(display.len() + 1);
            raw.push(SENTINEL);
            raw.push_str(display);
            raw
        }
        EditMode::Plain => display.to_string(),
    }
}

/// Strips the sentinel from a raw buffer, leaving plain text untouched.
pub fn strip_sentinel(raw: &str) -> &str {
    raw.strip_prefix(SENTINEL).unwrap_or(raw)
}

/// Value handed to the owning form. Empty text and the empty expression both mean "unset".
pub fn committed_value(raw: &str) -> Option<String> {
    if raw.is_empty() || strip_sentinel(raw).is_empty() && is_expression(raw) {
        None
    } else {
        Some(raw.to_string())
    }
}
