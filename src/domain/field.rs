use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a field entry inside the panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of the document element whose properties the panel is editing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Whether the user may leave expression mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ExpressionMode {
    #[default]
    Optional,
    Required,
}

impl ExpressionMode {
    pub fn is_required(self) -> bool {
        matches!(self, ExpressionMode::Required)
    }
}

/// Language-server parameters for the structured editor of a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSettings {
    #[serde(default)]
    pub language_id: Option<String>,
    #[serde(default)]
    pub server_uri: Option<String>,
    #[serde(default)]
    pub document_uri: Option<String>,
    #[serde(default)]
    pub root_uri: Option<String>,
    /// Text wrapped invisibly before the edited body when talking to the server.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    /// Report unreachable servers as field-level connection errors.
    #[serde(default)]
    pub report_connection_errors: bool,
}

impl LanguageSettings {
    /// Fills unset entries from `defaults`, keeping everything this field set itself.
    pub fn merged_with(&self, defaults: &LanguageSettings) -> LanguageSettings {
        LanguageSettings {
            language_id: self.language_id.clone().or_else(|| defaults.language_id.clone()),
            server_uri: self.server_uri.clone().or_else(|| defaults.server_uri.clone()),
            document_uri: self
                .document_uri
                .clone()
                .or_else(|| defaults.document_uri.clone()),
            root_uri: self.root_uri.clone().or_else(|| defaults.root_uri.clone()),
            prefix: self.prefix.clone().or_else(|| defaults.prefix.clone()),
            suffix: self.suffix.clone().or_else(|| defaults.suffix.clone()),
            report_connection_errors: self.report_connection_errors
                || defaults.report_connection_errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: FieldId,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expression: ExpressionMode,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub language: LanguageSettings,
    /// JSON Schema applied to the committed string value.
    #[serde(default)]
    pub validation: Option<Value>,
    /// Plain mode edits a text area instead of a single line.
    #[serde(default)]
    pub multiline: bool,
    /// The text area grows with its line count instead of showing a fixed height.
    #[serde(default)]
    pub auto_resize: bool,
}

/// Reference link shown in the popup title for a language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PopupLink {
    pub title: String,
    pub href: String,
}

impl PopupLink {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }
}

impl FieldDefinition {
    pub fn new(id: impl Into<FieldId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            expression: ExpressionMode::Optional,
            disabled: false,
            placeholder: None,
            language: LanguageSettings::default(),
            validation: None,
            multiline: false,
            auto_resize: false,
        }
    }

    pub fn with_expression(mut self, expression: ExpressionMode) -> Self {
        self.expression = expression;
        self
    }

    pub fn with_language(mut self, language: LanguageSettings) -> Self {
        self.language = language;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_validation(mut self, schema: Value) -> Self {
        self.validation = Some(schema);
        self
    }

    /// Edits plain values in a text area, optionally sized to its content.
    pub fn with_multiline(mut self, auto_resize: bool) -> Self {
        self.multiline = true;
        self.auto_resize = auto_resize;
        self
    }
}
