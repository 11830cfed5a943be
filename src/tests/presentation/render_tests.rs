use std::time::Instant;

use ratatui::{Terminal, backend::TestBackend, buffer::Buffer};

use crate::app::{App, PanelOptions, PropertiesPanel};
use crate::domain::{ElementRecord, FieldDefinition, PanelDocument, PopupLink};
use crate::tests::support::{RecordingConnector, ctrl, feel_language};

fn app() -> App {
    let document = PanelDocument::new(vec![
        FieldDefinition::new("condition", "Condition"),
        FieldDefinition::new("name", "Name").with_placeholder("Task name"),
        FieldDefinition::new("script", "Script").with_disabled(true),
    ])
    .with_language(feel_language())
    .with_element(
        ElementRecord::new("task_1")
            .with_kind("Task")
            .with_label("Review order")
            .with_value("condition", Some("=amount > 100")),
    );
    let mut app = PropertiesPanel::new(document)
        .with_connector(RecordingConnector::default())
        .with_options(PanelOptions::default())
        .into_app()
        .expect("panel mounts");
    app.tick(Instant::now());
    app
}

fn render(app: &mut App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 32)).expect("terminal");
    terminal.draw(|frame| app.draw(frame)).expect("draw");
    buffer_text(terminal.backend().buffer())
}

fn buffer_text(buffer: &Buffer) -> String {
    let area = buffer.area;
    let mut text = String::new();
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

#[test]
fn fields_show_mode_badges_and_values() {
    let mut app = app();
    let screen = render(&mut app);
    assert!(screen.contains("Review order"));
    assert!(screen.contains("[=] Condition"));
    assert!(screen.contains("amount > 100"));
    assert!(screen.contains("[ ] Name"));
    assert!(screen.contains("Task name"), "empty fields show their placeholder");
    assert!(screen.contains("(read-only)"));
    assert!(screen.contains("[ok]"));
}

#[test]
fn popup_replaces_the_inline_value() {
    let mut app = app();
    let start = Instant::now();
    app.handle_key(ctrl('o'), start);
    app.tick(start);
    let screen = render(&mut app);
    assert!(screen.contains("Opened in editor"));
    assert!(screen.contains("Task / Condition"));
    assert!(screen.contains("   1 │amount > 100"));
}

#[test]
fn text_areas_grow_with_their_lines() {
    let document = PanelDocument::new(vec![
        FieldDefinition::new("notes", "Notes").with_multiline(true),
        FieldDefinition::new("summary", "Summary").with_multiline(false),
    ])
    .with_language(feel_language())
    .with_element(
        ElementRecord::new("task_1")
            .with_value("notes", Some("first line\nsecond line\nthird line"))
            .with_value("summary", Some("one\ntwo\nthree")),
    );
    let mut app = PropertiesPanel::new(document)
        .with_connector(RecordingConnector::default())
        .into_app()
        .expect("panel mounts");
    app.tick(Instant::now());
    let screen = render(&mut app);
    assert!(screen.contains("third line"), "auto-resized areas show every line");
    assert!(screen.contains("two"));
    assert!(!screen.contains("three"), "fixed areas show two rows");
}

#[test]
fn popup_title_lists_language_links() {
    let document = PanelDocument::new(vec![FieldDefinition::new("condition", "Condition")])
        .with_language(feel_language())
        .with_popup_link("feel", PopupLink::new("FEEL reference", "https://docs.example/feel"))
        .with_popup_link("js", PopupLink::new("JS guide", "https://docs.example/js"))
        .with_element(ElementRecord::new("task_1").with_value("condition", Some("=a")));
    let mut app = PropertiesPanel::new(document)
        .with_connector(RecordingConnector::default())
        .into_app()
        .expect("panel mounts");
    let start = Instant::now();
    app.tick(start);
    app.handle_key(ctrl('o'), start);
    app.tick(start);
    let screen = render(&mut app);
    assert!(screen.contains("FEEL reference ↗ https://docs.example/feel"));
    assert!(!screen.contains("JS guide"));
}
