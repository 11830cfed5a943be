mod binding;
mod clipboard;
mod controller;
mod debounce;
mod error;
mod focus;
mod surface;

pub use binding::{PropertyBinding, SchemaValidator, Validate};
pub use clipboard::{ClipboardData, TEXT_FORMAT, expression_format};
pub use controller::ExpressionFieldController;
pub use debounce::Debouncer;
pub use error::{ErrorSlots, FieldError, SYNTAX_ERROR_MESSAGE, resolve_error};
pub use focus::{FocusCoordinator, FocusRequest, FocusTarget};
pub use surface::{PlainInput, Surface};
