use ratatui::{
    Frame,
    layout::{Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use textwrap::wrap;
use unicode_width::UnicodeWidthStr;

use crate::form::{ExpressionFieldController, PlainInput, Surface};

use super::super::view::UiContext;

pub(crate) const OPENED_IN_EDITOR: &str = "Opened in editor";
const MAX_SUGGESTIONS: usize = 5;

pub fn render_fields(
    frame: &mut Frame<'_>,
    area: Rect,
    ctx: &UiContext<'_>,
    enable_cursor: bool,
) -> Vec<Position> {
    if ctx.fields.is_empty() {
        let placeholder = Paragraph::new("This element has no properties")
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(placeholder, area);
        return Vec::new();
    }

    let content_width = area.width.saturating_sub(6);
    let selected_index = ctx.focused.min(ctx.fields.len().saturating_sub(1));
    let inner_x = area.x.saturating_add(1);
    let inner_y = area.y.saturating_add(1);
    let last_row = area.bottom().saturating_sub(2);
    let mut items = Vec::with_capacity(ctx.fields.len());
    let mut anchors = Vec::with_capacity(ctx.fields.len());
    let mut cursor_hint: Option<CursorHint> = None;
    let mut line_offset = 0usize;

    for (idx, field) in ctx.fields.iter().enumerate() {
        let render = build_field_render(field, idx == selected_index, content_width);
        let row = inner_y.saturating_add((line_offset + render.value_line) as u16);
        anchors.push(Position::new(inner_x.saturating_add(2), row.min(last_row)));
        if let Some(mut hint) = render.cursor_hint {
            hint.line_offset += line_offset;
            cursor_hint = Some(hint);
        }
        line_offset += render.lines.len();
        items.push(ListItem::new(render.lines));
    }

    let mut list_state = ListState::default();
    list_state.select(Some(selected_index));

    let list = List::new(items)
        .block(Block::default().title("Properties").borders(Borders::ALL))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("» ");

    frame.render_stateful_widget(list, area, &mut list_state);

    if enable_cursor {
        if let Some(cursor) = cursor_hint {
            let line = cursor
                .line_offset
                .min(area.height.saturating_sub(2) as usize) as u16;
            let cursor_y = inner_y.saturating_add(line);
            let cursor_x = inner_x
                .saturating_add(2)
                .saturating_add(cursor.column_offset)
                .saturating_add(cursor.value_width);
            frame.set_cursor_position((cursor_x, cursor_y));
        }
    }
    anchors
}

struct FieldRender {
    lines: Vec<Line<'static>>,
    /// Index of the first value line inside `lines`.
    value_line: usize,
    cursor_hint: Option<CursorHint>,
}

struct CursorHint {
    line_offset: usize,
    column_offset: u16,
    value_width: u16,
}

fn build_field_render(
    field: &ExpressionFieldController,
    is_selected: bool,
    max_width: u16,
) -> FieldRender {
    let definition = field.field();
    let mut lines = Vec::new();

    let label_style = if is_selected {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    };
    let mut header = vec![
        expression_badge(field),
        Span::raw(" "),
        Span::styled(definition.label.clone(), label_style),
    ];
    if definition.disabled {
        header.push(Span::styled(
            "  (read-only)",
            Style::default().fg(Color::DarkGray),
        ));
    }
    lines.push(Line::from(header));

    let value_line = lines.len();
    let (value_lines, cursor_hint) = value_lines(field, is_selected, max_width);
    let cursor_hint = cursor_hint.map(|mut hint| {
        hint.line_offset += value_line;
        hint
    });
    lines.extend(value_lines);

    if is_selected {
        lines.extend(suggestion_lines(field));
    }

    if let Some(description) = definition.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(
                description.to_string(),
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            ),
        ]));
    }

    if let Some(error) = field.displayed_error() {
        lines.extend(message_lines(error, max_width, Color::Red));
    }
    if let Some(error) = field.connection_error() {
        lines.extend(message_lines(error, max_width, Color::LightRed));
    }

    FieldRender {
        lines,
        value_line,
        cursor_hint,
    }
}

fn expression_badge(field: &ExpressionFieldController) -> Span<'static> {
    let style = if !field.can_toggle() {
        Style::default().fg(Color::DarkGray)
    } else if field.mode().is_expression() {
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let badge = if field.mode().is_expression() { "[=]" } else { "[ ]" };
    Span::styled(badge, style)
}

fn value_lines(
    field: &ExpressionFieldController,
    is_selected: bool,
    max_width: u16,
) -> (Vec<Line<'static>>, Option<CursorHint>) {
    let clamp_width = max_width.max(4) as usize;
    if field.is_popup_owned() {
        let line = Line::from(vec![
            Span::raw("  "),
            Span::styled(
                OPENED_IN_EDITOR,
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            ),
        ]);
        return (vec![line], None);
    }
    if let Surface::Plain(input) = field.surface() {
        if input.is_multiline() {
            return text_area_lines(input, is_selected, clamp_width);
        }
    }

    let (text, placeholder, caret) = match field.surface() {
        Surface::Plain(input) => (input.value(), input.placeholder(), Some(input.caret())),
        Surface::Structured(editor) => (
            editor.value(),
            editor.placeholder(),
            Some(editor.document().caret()),
        ),
    };

    if text.is_empty() {
        let line = Line::from(vec![
            Span::raw("  "),
            Span::styled(placeholder.to_string(), Style::default().fg(Color::DarkGray)),
        ]);
        let hint = is_selected.then_some(CursorHint {
            line_offset: 0,
            column_offset: 2,
            value_width: 0,
        });
        return (vec![line], hint);
    }

    let value_style = value_style(is_selected);
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        let segments = wrap(raw_line, clamp_width);
        if segments.is_empty() {
            lines.push(Line::from(Span::raw("  ")));
        }
        for segment in segments {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(segment.into_owned(), value_style),
            ]));
        }
    }

    let hint = if is_selected {
        caret.map(|caret| caret_hint(text, caret, clamp_width))
    } else {
        None
    };
    (lines, hint)
}

fn value_style(is_selected: bool) -> Style {
    if is_selected {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    }
}

/// A text area shows `rows` lines, scrolled so the caret line stays visible.
fn text_area_lines(
    input: &PlainInput,
    is_selected: bool,
    max_width: usize,
) -> (Vec<Line<'static>>, Option<CursorHint>) {
    let rows = input.rows().max(1);
    let (caret_line, caret_column) = input.caret_line_col();
    let scroll = caret_line.saturating_sub(rows - 1);
    let mut lines: Vec<Line<'static>> = if input.value().is_empty() {
        vec![Line::from(vec![
            Span::raw("  "),
            Span::styled(
                input.placeholder().to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ])]
    } else {
        let style = value_style(is_selected);
        input
            .value()
            .split('\n')
            .skip(scroll)
            .take(rows)
            .map(|line| Line::from(vec![Span::raw("  "), Span::styled(line.to_string(), style)]))
            .collect()
    };
    while lines.len() < rows {
        lines.push(Line::from(Span::raw("  ")));
    }
    let hint = is_selected.then(|| {
        let line = input.value().split('\n').nth(caret_line).unwrap_or_default();
        let before: String = line.chars().take(caret_column).collect();
        CursorHint {
            line_offset: caret_line - scroll,
            column_offset: 2,
            value_width: UnicodeWidthStr::width(before.as_str()).min(max_width) as u16,
        }
    });
    (lines, hint)
}

/// Screen offset of the caret in `text` laid out one source line per row.
fn caret_hint(text: &str, caret: usize, max_width: usize) -> CursorHint {
    let before: String = text.chars().take(caret).collect();
    let row = before.matches('\n').count();
    let column = before.rsplit('\n').next().unwrap_or_default();
    let width = UnicodeWidthStr::width(column).min(max_width);
    CursorHint {
        line_offset: row,
        column_offset: 2,
        value_width: width as u16,
    }
}

fn suggestion_lines(field: &ExpressionFieldController) -> Vec<Line<'static>> {
    let Surface::Structured(editor) = field.surface() else {
        return Vec::new();
    };
    let Some(suggestions) = editor.suggestions() else {
        return Vec::new();
    };
    suggestions
        .items
        .iter()
        .enumerate()
        .take(MAX_SUGGESTIONS)
        .map(|(idx, item)| {
            let (marker, style) = if idx == suggestions.selected {
                (
                    "» ",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                ("  ", Style::default().fg(Color::Gray))
            };
            Line::from(vec![
                Span::raw("    "),
                Span::styled(format!("{marker}{}", item.label), style),
            ])
        })
        .collect()
}

fn message_lines(message: &str, max_width: u16, color: Color) -> Vec<Line<'static>> {
    wrap(message, max_width.max(4) as usize)
        .into_iter()
        .enumerate()
        .map(|(idx, line)| {
            let prefix = if idx == 0 { "  ⚠ " } else { "    " };
            Line::from(Span::styled(
                format!("{prefix}{line}"),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
        })
        .collect()
}
