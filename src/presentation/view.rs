use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position},
};

use crate::domain::ElementRecord;
use crate::form::ExpressionFieldController;
use crate::popup::PopupSession;

use super::components::{render_fields, render_footer, render_header, render_popup};

pub struct UiContext<'a> {
    pub title: Option<&'a str>,
    pub element: Option<&'a ElementRecord>,
    /// Index of the element and number of elements.
    pub element_position: (usize, usize),
    pub fields: &'a [ExpressionFieldController],
    pub focused: usize,
    pub popup: Option<&'a PopupSession>,
    pub status_message: &'a str,
    pub dirty: bool,
    pub error_count: usize,
    pub help: Option<&'a str>,
}

/// Draws the panel and returns the screen position of every field's value line.
pub fn draw(frame: &mut Frame<'_>, ctx: UiContext<'_>) -> Vec<Position> {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], &ctx);
    let cursor_enabled = ctx.popup.is_none();
    let anchors = render_fields(frame, chunks[1], &ctx, cursor_enabled);
    render_footer(frame, chunks[2], &ctx);

    if let Some(popup) = ctx.popup {
        render_popup(frame, popup);
    }
    anchors
}
