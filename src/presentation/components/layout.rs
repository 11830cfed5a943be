use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};

pub fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);
    let inner = vertical[1];
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(inner.width.saturating_sub(width) / 2),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(inner);
    horizontal[1]
}

/// Places a `width`×`height` box just below `anchor`, or above it when the bottom edge would
/// cut it off, shifted left as needed to stay inside `area`.
pub fn anchored_rect(area: Rect, anchor: Position, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let max_x = area.right().saturating_sub(width);
    let x = anchor.x.clamp(area.x, max_x.max(area.x));
    let below = anchor.y.saturating_add(1);
    let y = if below.saturating_add(height) <= area.bottom() {
        below
    } else {
        anchor.y.saturating_sub(height).max(area.y)
    };
    Rect::new(x, y, width, height)
}
