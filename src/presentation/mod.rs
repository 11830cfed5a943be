mod components;
mod view;

pub use components::{anchored_rect, popup_rect};
pub use view::{UiContext, draw};
