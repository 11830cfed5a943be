use crate::domain::FieldId;

/// Message shown while the structured editor reports an error diagnostic.
pub const SYNTAX_ERROR_MESSAGE: &str = "Unparsable syntax.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: FieldId,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &FieldId, message: impl Into<String>) -> Self {
        Self {
            field: field.clone(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

/// First present error in priority order: transient, syntax, validation.
pub fn resolve_error<'a>(
    temporary: Option<&'a str>,
    local: Option<&'a str>,
    validation: Option<&'a str>,
) -> Option<&'a str> {
    [temporary, local, validation]
        .into_iter()
        .flatten()
        .find(|message| !message.is_empty())
}

/// The three independently sourced error messages of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSlots {
    pub temporary: Option<String>,
    pub local: Option<String>,
    pub validation: Option<String>,
}

impl ErrorSlots {
    pub fn displayed(&self) -> Option<&str> {
        resolve_error(
            self.temporary.as_deref(),
            self.local.as_deref(),
            self.validation.as_deref(),
        )
    }

    pub fn has_error(&self) -> bool {
        self.displayed().is_some()
    }
}
