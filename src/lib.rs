#![deny(rust_2018_idioms)]

//! Toggleable expression fields for terminal property panels.
//!
//! A field holds either plain text or an expression. Expressions are stored behind a leading
//! `=` and edited in a structured editor backed by a language server; plain text uses a simple
//! single-line input. [`PropertiesPanel`] runs a full ratatui panel over a [`PanelDocument`].

pub mod app;
pub mod domain;
pub mod form;
pub mod io;
pub mod lsp;
pub mod popup;
pub mod presentation;

pub use app::{KeyAction, PanelOptions, PanelOutcome, PanelValues, PropertiesPanel};
pub use domain::{
    EditMode, ElementRecord, ExpressionMode, FieldDefinition, FieldId, LanguageSettings,
    PanelDocument, PopupLink,
};
pub use form::{ClipboardData, ExpressionFieldController, PropertyBinding, Validate};
pub use io::{DocumentFormat, OutputDestination, OutputOptions, emit, parse_panel_document};
pub use lsp::{
    LanguageConnector, OfflineConnector, ServerConnector, StructuredEditorSession, TcpConnector,
    WebSocketConnector,
};
pub use popup::PopupSession;

pub mod prelude {
    pub use super::{
        DocumentFormat, ElementRecord, FieldDefinition, LanguageSettings, OutputOptions,
        PanelDocument, PanelOptions, PanelOutcome, PropertiesPanel,
    };
}

#[cfg(test)]
mod tests;
