mod format;
mod input;
mod output;

pub use format::DocumentFormat;
pub use input::{panel_document_from_value, parse_document_str, parse_panel_document};
pub use output::{OutputDestination, OutputOptions, emit, render};
