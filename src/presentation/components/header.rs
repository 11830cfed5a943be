use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use super::super::view::UiContext;

pub fn render_header(frame: &mut Frame<'_>, area: Rect, ctx: &UiContext<'_>) {
    let title = ctx.title.unwrap_or("Properties");
    let mut spans = Vec::new();
    match ctx.element {
        Some(element) => {
            let name = element.label.as_deref().unwrap_or(element.id.as_str());
            spans.push(Span::styled(
                name.to_string(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
            if let Some(kind) = &element.kind {
                spans.push(Span::styled(
                    format!("  {kind}"),
                    Style::default().fg(Color::Gray),
                ));
            }
            let (index, len) = ctx.element_position;
            if len > 1 {
                spans.push(Span::styled(
                    format!("  [{}/{}]", index + 1, len),
                    Style::default().fg(Color::DarkGray),
                ));
            }
        }
        None => spans.push(Span::raw("No element selected")),
    }
    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    frame.render_widget(header, area);
}
