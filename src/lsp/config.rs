use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

use crate::domain::LanguageSettings;

const LANGUAGE_ID_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    #[error("missing mandatory parameter: {0}")]
    MissingParameter(&'static str),
    #[error("invalid {name} '{value}': {reason}")]
    InvalidUri {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Whether an unreachable language server is reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionErrors {
    #[default]
    Ignore,
    Report,
}

/// Construction parameters of a structured editor, as supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorConfig {
    pub language_id: Option<String>,
    pub server_uri: Option<String>,
    pub document_uri: Option<String>,
    pub root_uri: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub placeholder: Option<String>,
    pub read_only: bool,
    pub line_numbers: bool,
    pub connection_errors: ConnectionErrors,
}

impl EditorConfig {
    pub fn new(language_id: impl Into<String>, server_uri: impl Into<String>) -> Self {
        Self {
            language_id: Some(language_id.into()),
            server_uri: Some(server_uri.into()),
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &LanguageSettings) -> Self {
        Self {
            language_id: settings.language_id.clone(),
            server_uri: settings.server_uri.clone(),
            document_uri: settings.document_uri.clone(),
            root_uri: settings.root_uri.clone(),
            prefix: settings.prefix.clone(),
            suffix: settings.suffix.clone(),
            connection_errors: if settings.report_connection_errors {
                ConnectionErrors::Report
            } else {
                ConnectionErrors::Ignore
            },
            ..Self::default()
        }
    }

    pub fn with_document_uri(mut self, uri: impl Into<String>) -> Self {
        self.document_uri = Some(uri.into());
        self
    }

    pub fn with_wrapping(mut self, prefix: Option<String>, suffix: Option<String>) -> Self {
        self.prefix = prefix;
        self.suffix = suffix;
        self
    }

    pub fn with_placeholder(mut self, placeholder: Option<String>) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_line_numbers(mut self, line_numbers: bool) -> Self {
        self.line_numbers = line_numbers;
        self
    }

    pub fn with_connection_errors(mut self, policy: ConnectionErrors) -> Self {
        self.connection_errors = policy;
        self
    }

    /// Checks mandatory parameters and derives the default URIs.
    pub fn resolve(&self) -> Result<ResolvedEditorConfig, EditorError> {
        let language_id = self
            .language_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(EditorError::MissingParameter("languageId"))?;
        let server_uri = self
            .server_uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .ok_or(EditorError::MissingParameter("serverUri"))?;
        let server_uri = parse_uri("serverUri", server_uri)?;

        let document_uri = match &self.document_uri {
            Some(uri) => uri.clone(),
            None => default_document_uri(&language_id),
        };
        let root_uri = match &self.root_uri {
            Some(uri) => uri.clone(),
            None => parent_uri(&document_uri).to_string(),
        };

        Ok(ResolvedEditorConfig {
            language_id,
            server_uri,
            document_uri: parse_uri("documentUri", &document_uri)?,
            root_uri: parse_uri("rootUri", &root_uri)?,
            prefix: self.prefix.clone().unwrap_or_default(),
            suffix: self.suffix.clone().unwrap_or_default(),
            placeholder: self.placeholder.clone().unwrap_or_default(),
            read_only: self.read_only,
            line_numbers: self.line_numbers,
            connection_errors: self.connection_errors,
        })
    }
}

/// Editor parameters with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEditorConfig {
    pub language_id: String,
    pub server_uri: Url,
    pub document_uri: Url,
    pub root_uri: Url,
    pub prefix: String,
    pub suffix: String,
    pub placeholder: String,
    pub read_only: bool,
    pub line_numbers: bool,
    pub connection_errors: ConnectionErrors,
}

impl ResolvedEditorConfig {
    /// Text the language server sees for a given editor body.
    pub fn wrap(&self, body: &str) -> String {
        let mut text = String::with_capacity(self.prefix.len() + body.len() + self.suffix.len());
        text.push_str(&self.prefix);
        text.push_str(body);
        text.push_str(&self.suffix);
        text
    }

    pub fn with_line_numbers(mut self, line_numbers: bool) -> Self {
        self.line_numbers = line_numbers;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

pub fn default_document_uri(language_id: &str) -> String {
    format!(
        "inmemory:/document.{}",
        utf8_percent_encode(language_id, LANGUAGE_ID_ESCAPES)
    )
}

fn parent_uri(document_uri: &str) -> &str {
    match document_uri.rfind('/') {
        Some(index) => &document_uri[..=index],
        None => document_uri,
    }
}

fn parse_uri(name: &'static str, value: &str) -> Result<Url, EditorError> {
    Url::parse(value).map_err(|err| EditorError::InvalidUri {
        name,
        value: value.to_string(),
        reason: err.to_string(),
    })
}
