use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use crate::domain::PopupLink;
use crate::lsp::{StructuredEditorSession, has_error_diagnostic};
use crate::popup::{POPUP_HEIGHT, POPUP_WIDTH, PopupSession};

use super::layout::{anchored_rect, popup_rect};

const GUTTER_WIDTH: u16 = 6;

pub fn render_popup(frame: &mut Frame<'_>, popup: &PopupSession) {
    let (Some(config), Some(editor)) = (popup.config(), popup.editor()) else {
        return;
    };
    let screen = frame.area();
    let width = POPUP_WIDTH.min(screen.width.saturating_sub(2).max(1));
    let height = POPUP_HEIGHT.min(screen.height);
    let area = match config.anchor {
        Some(anchor) => anchored_rect(screen, anchor, width, height),
        None => popup_rect(screen, width, height),
    };
    frame.render_widget(Clear, area);

    let mut block = Block::default()
        .title(config.title.clone())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    if !config.links.is_empty() {
        block = block.title(link_title(&config.links));
    }
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let suggestion_rows = editor
        .suggestions()
        .map(|suggestions| suggestions.items.len().min(5) as u16 + 2)
        .unwrap_or(0);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(suggestion_rows),
            Constraint::Length(1),
        ])
        .split(inner);

    render_editor_body(frame, chunks[0], editor);
    if suggestion_rows > 0 {
        render_suggestions(frame, chunks[1], editor);
    }
    render_diagnostics(frame, chunks[2], editor);
}

fn link_title(links: &[PopupLink]) -> Line<'static> {
    let style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::UNDERLINED);
    let spans: Vec<Span<'static>> = links
        .iter()
        .flat_map(|link| {
            [
                Span::raw(" "),
                Span::styled(format!("{} ↗ {}", link.title, link.href), style),
                Span::raw(" "),
            ]
        })
        .collect();
    Line::from(spans).right_aligned()
}

fn render_editor_body(frame: &mut Frame<'_>, area: Rect, editor: &StructuredEditorSession) {
    let document = editor.document();
    let (caret_line, caret_col) = document.line_col(document.caret());
    let visible = area.height.max(1) as usize;
    let scroll = caret_line.saturating_sub(visible - 1);
    let gutter = Style::default().fg(Color::DarkGray);

    let lines: Vec<Line<'static>> = if document.is_empty() {
        vec![Line::from(vec![
            Span::styled(format!("{:>4} │", 1), gutter),
            Span::styled(
                editor.placeholder().to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ])]
    } else {
        document
            .lines()
            .enumerate()
            .skip(scroll)
            .take(visible)
            .map(|(idx, line)| {
                Line::from(vec![
                    Span::styled(format!("{:>4} │", idx + 1), gutter),
                    Span::raw(line.to_string()),
                ])
            })
            .collect()
    };
    frame.render_widget(Paragraph::new(lines), area);

    if editor.is_focused() {
        let line_text = document.lines().nth(caret_line).unwrap_or_default();
        let before: String = line_text.chars().take(caret_col).collect();
        let column = UnicodeWidthStr::width(before.as_str()) as u16;
        let x = area
            .x
            .saturating_add(GUTTER_WIDTH)
            .saturating_add(column)
            .min(area.right().saturating_sub(1));
        let y = area.y.saturating_add((caret_line - scroll) as u16);
        frame.set_cursor_position((x, y));
    }
}

fn render_suggestions(frame: &mut Frame<'_>, area: Rect, editor: &StructuredEditorSession) {
    let Some(suggestions) = editor.suggestions() else {
        return;
    };
    let items: Vec<ListItem<'static>> = suggestions
        .items
        .iter()
        .map(|item| {
            let detail = item.detail.clone().unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::raw(item.label.clone()),
                Span::styled(format!("  {detail}"), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();
    let mut state = ListState::default();
    state.select(Some(suggestions.selected));
    let list = List::new(items)
        .block(Block::default().title("Suggestions").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("» ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_diagnostics(frame: &mut Frame<'_>, area: Rect, editor: &StructuredEditorSession) {
    let diagnostics = editor.diagnostics();
    let line = match diagnostics.first() {
        Some(first) => {
            let color = if has_error_diagnostic(diagnostics) {
                Color::Red
            } else {
                Color::Yellow
            };
            Line::from(Span::styled(
                format!("⚠ {}", first.message),
                Style::default().fg(color),
            ))
        }
        None if !editor.is_connected() => Line::from(Span::styled(
            "language server offline",
            Style::default().fg(Color::DarkGray),
        )),
        None => Line::from(Span::styled(
            "Esc closes the editor",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}
