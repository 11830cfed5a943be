pub mod codec;
mod document;
mod field;

pub use codec::{Classified, EditMode, SENTINEL, classify, encode};
pub use document::{ElementRecord, PanelDocument};
pub use field::{
    ElementId, ExpressionMode, FieldDefinition, FieldId, LanguageSettings, PopupLink,
};
