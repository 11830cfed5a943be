pub(crate) mod input;
pub(crate) mod keymap;
mod options;
mod panel;
mod runtime;
mod status;
mod store;
mod terminal;

pub use input::KeyAction;
pub use options::PanelOptions;
pub use panel::{PanelOutcome, PropertiesPanel};
pub use status::StatusLine;
pub use store::PanelValues;
pub use terminal::TerminalGuard;

#[cfg(test)]
pub(crate) use runtime::App;
