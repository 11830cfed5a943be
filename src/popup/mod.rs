mod escape;
mod events;
mod session;

pub use escape::EscapeGuard;
pub use events::{EventBus, ListenerId, PopupEvent, PopupEventKind, PopupHandle, PopupRequest};
pub use session::{POPUP_HEIGHT, POPUP_WIDTH, PopupConfig, PopupKeyOutcome, PopupSession};
