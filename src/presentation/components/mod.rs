mod fields;
mod footer;
mod header;
mod layout;
mod popup;

pub use fields::render_fields;
pub use footer::render_footer;
pub use header::render_header;
pub use layout::{anchored_rect, popup_rect};
pub use popup::render_popup;
