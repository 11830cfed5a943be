use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use crate::app::{App, PanelOptions, PropertiesPanel};
use crate::domain::{EditMode, ElementRecord, FieldDefinition, PanelDocument};
use crate::tests::support::{RecordingConnector, ctrl, feel_language, key};

const DEBOUNCE: Duration = Duration::from_millis(300);

fn document() -> PanelDocument {
    PanelDocument::new(vec![
        FieldDefinition::new("condition", "Condition"),
        FieldDefinition::new("name", "Name").with_placeholder("Task name"),
        FieldDefinition::new("script", "Script").with_disabled(true),
    ])
    .with_language(feel_language())
    .with_element(
        ElementRecord::new("task_1")
            .with_kind("Task")
            .with_value("condition", Some("=a"))
            .with_value("name", Some("Review")),
    )
    .with_element(ElementRecord::new("task_2").with_value("condition", Some("=b")))
}

fn app(connector: &RecordingConnector) -> App {
    let mut app = PropertiesPanel::new(document())
        .with_connector(connector.clone())
        .with_options(PanelOptions::default().with_debounce(DEBOUNCE))
        .into_app()
        .expect("panel mounts");
    app.tick(Instant::now());
    app
}

fn type_text(app: &mut App, text: &str, now: Instant) {
    for ch in text.chars() {
        app.handle_key(key(KeyCode::Char(ch)), now);
    }
}

#[test]
fn typing_commits_to_the_store_after_the_debounce() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    type_text(&mut app, "b", start);
    assert_eq!(app.fields()[0].buffer(), "=ab");
    assert_eq!(app.stored_value("condition").as_deref(), Some("=a"));

    app.tick(start + DEBOUNCE);
    assert_eq!(app.stored_value("condition").as_deref(), Some("=ab"));
}

#[test]
fn save_flushes_pending_edits_and_returns_every_element() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    type_text(&mut app, " + 1", start);
    app.handle_key(ctrl('s'), start);

    let values = app.take_result().expect("saved");
    assert_eq!(
        values["task_1"]["condition"].as_deref(),
        Some("=a + 1"),
        "save does not wait for the debounce"
    );
    assert_eq!(values["task_1"]["script"], None);
    assert_eq!(values["task_2"]["condition"].as_deref(), Some("=b"));
}

#[test]
fn quitting_with_unsaved_changes_needs_confirmation() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    type_text(&mut app, "x", start);
    app.handle_key(ctrl('q'), start);
    assert!(!app.should_quit());
    assert!(app.status_message().contains("again"));

    app.handle_key(ctrl('q'), start);
    assert!(app.should_quit());
    assert_eq!(app.take_result(), None);
}

#[test]
fn read_only_fields_explain_themselves_until_dismissed() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    app.handle_key(key(KeyCode::BackTab), start);
    assert_eq!(app.focused_field().map(|id| id.as_str()), Some("script"));
    type_text(&mut app, "x", start);
    assert_eq!(app.fields()[2].displayed_error(), Some("Field is read-only."));
    assert_eq!(app.fields()[2].buffer(), "");

    app.handle_key(key(KeyCode::Esc), start);
    assert_eq!(app.fields()[2].displayed_error(), None);
}

#[test]
fn undo_and_redo_resync_the_field() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    type_text(&mut app, "b", start);
    app.tick(start + DEBOUNCE);

    app.handle_key(ctrl('z'), start + DEBOUNCE);
    assert_eq!(app.stored_value("condition").as_deref(), Some("=a"));
    assert_eq!(app.fields()[0].buffer(), "=a");

    app.handle_key(ctrl('y'), start + DEBOUNCE);
    assert_eq!(app.stored_value("condition").as_deref(), Some("=ab"));
    assert_eq!(app.fields()[0].buffer(), "=ab");

    app.handle_key(ctrl('y'), start + DEBOUNCE);
    assert_eq!(app.status_message(), "Nothing to redo.");
}

#[test]
fn toggle_key_switches_the_focused_field() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    app.handle_key(key(KeyCode::Tab), start);
    app.handle_key(ctrl('e'), start);
    let name = &app.fields()[1];
    assert_eq!((name.mode(), name.buffer()), (EditMode::Expression, "=Review"));

    app.tick(start + DEBOUNCE);
    assert_eq!(app.stored_value("name").as_deref(), Some("=Review"));
}

#[test]
fn terminal_paste_keeps_the_format_of_an_in_panel_copy() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    app.handle_key(key(KeyCode::Tab), start);
    app.handle_key(ctrl('x'), start);
    assert_eq!(app.fields()[1].buffer(), "");
    app.handle_key(key(KeyCode::BackTab), start);
    app.handle_key(ctrl('c'), start);
    app.handle_key(key(KeyCode::Tab), start);

    app.handle_paste("a", start);
    app.tick(start);
    let name = &app.fields()[1];
    assert_eq!((name.mode(), name.buffer()), (EditMode::Expression, "=a"));
}

#[test]
fn foreign_terminal_paste_stays_plain_text() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    app.handle_key(ctrl('c'), start);
    app.handle_key(key(KeyCode::Tab), start);
    app.handle_paste("!", start);
    app.tick(start);
    let name = &app.fields()[1];
    assert_eq!((name.mode(), name.buffer()), (EditMode::Plain, "Review!"));
}

#[test]
fn switching_elements_remounts_the_fields() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    type_text(&mut app, "b", start);
    app.handle_key(ctrl('n'), start);
    assert_eq!(app.current_element(), Some("task_2"));
    assert_eq!(app.fields()[0].buffer(), "=b");
    assert_eq!(app.focused_field().map(|id| id.as_str()), Some("condition"));

    app.tick(start + DEBOUNCE);
    app.handle_key(ctrl('p'), start + DEBOUNCE);
    assert_eq!(
        app.stored_value("condition").as_deref(),
        Some("=a"),
        "the pending edit was discarded with its field"
    );
}

#[test]
fn save_is_refused_while_a_committed_value_is_invalid() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut document = document();
    document.fields[1] = FieldDefinition::new("name", "Name")
        .with_validation(serde_json::json!({"type": "string", "maxLength": 6}));
    let mut app = PropertiesPanel::new(document)
        .with_connector(connector.clone())
        .with_options(PanelOptions::default().with_debounce(DEBOUNCE))
        .into_app()
        .expect("panel mounts");
    app.tick(start);

    app.handle_key(key(KeyCode::Tab), start);
    type_text(&mut app, "!", start);
    app.handle_key(ctrl('s'), start);
    assert_eq!(app.take_result(), None);
    assert_eq!(app.status_message(), "1 field error(s) remaining");

    for _ in 0..4 {
        app.handle_key(key(KeyCode::Backspace), start);
    }
    app.handle_key(ctrl('s'), start);
    let values = app.take_result().expect("saved once valid");
    assert_eq!(values["task_1"]["name"].as_deref(), Some("Rev"));
}

#[test]
fn text_area_fields_take_line_breaks() {
    let start = Instant::now();
    let document = PanelDocument::new(vec![
        FieldDefinition::new("notes", "Notes").with_multiline(true),
        FieldDefinition::new("name", "Name"),
    ])
    .with_element(
        ElementRecord::new("task_1")
            .with_value("notes", Some("a"))
            .with_value("name", Some("Review")),
    );
    let mut app = PropertiesPanel::new(document)
        .with_connector(RecordingConnector::default())
        .with_options(PanelOptions::default().with_debounce(DEBOUNCE))
        .into_app()
        .expect("fields without a language mount as plain inputs");
    app.tick(start);

    app.handle_key(key(KeyCode::Enter), start);
    type_text(&mut app, "b", start);
    assert_eq!(app.fields()[0].display(), "a\nb");
    app.handle_key(key(KeyCode::Down), start);
    assert_eq!(
        app.focused_field().map(|id| id.as_str()),
        Some("name"),
        "the last line hands Down to the panel"
    );

    app.handle_key(key(KeyCode::Enter), start);
    assert_eq!(app.fields()[1].display(), "Review");

    app.handle_key(ctrl('s'), start);
    let values = app.take_result().expect("saved");
    assert_eq!(values["task_1"]["notes"].as_deref(), Some("a\nb"));
}
