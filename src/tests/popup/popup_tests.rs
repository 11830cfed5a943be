use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lsp_types::CompletionItem;

use crate::app::{App, KeyAction, PanelOptions, PropertiesPanel};
use crate::domain::{EditMode, ElementRecord, FieldDefinition, PanelDocument};
use crate::lsp::ServerMessage;
use crate::popup::PopupRequest;
use crate::tests::support::{RecordingConnector, ctrl, feel_language, key};

const DEBOUNCE: Duration = Duration::from_millis(300);

fn app(connector: &RecordingConnector) -> App {
    let document = PanelDocument::new(vec![
        FieldDefinition::new("condition", "Condition"),
        FieldDefinition::new("name", "Name"),
    ])
    .with_language(feel_language())
    .with_element(
        ElementRecord::new("task_1")
            .with_kind("Task")
            .with_value("condition", Some("=a")),
    )
    .with_element(ElementRecord::new("task_2").with_value("condition", Some("=b")));
    let mut app = PropertiesPanel::new(document)
        .with_connector(connector.clone())
        .with_options(PanelOptions::default().with_debounce(DEBOUNCE))
        .into_app()
        .expect("panel mounts");
    app.tick(Instant::now());
    app
}

fn open_popup(app: &mut App, now: Instant) {
    app.handle_key(ctrl('o'), now);
    assert!(app.popup().is_open(), "popup opens for the focused expression");
    app.tick(now);
}

fn completion(label: &str) -> CompletionItem {
    CompletionItem {
        label: label.into(),
        ..CompletionItem::default()
    }
}

#[test]
fn popup_takes_over_the_field_and_forwards_edits() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);
    open_popup(&mut app, start);

    let config = app.popup().config().expect("open");
    assert_eq!(config.title, "Task / Condition");
    assert!(app.fields()[0].is_popup_owned());
    let editor = app.popup().editor().expect("open");
    assert!(editor.is_focused());
    assert_eq!(editor.document().caret(), 1);

    app.handle_key(key(KeyCode::Char('c')), start);
    assert_eq!(app.fields()[0].buffer(), "=ac");
    app.tick(start + DEBOUNCE);
    assert_eq!(app.stored_value("condition").as_deref(), Some("=ac"));
}

#[test]
fn plain_fields_do_not_open_the_popup() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);
    app.handle_key(key(KeyCode::Tab), start);
    app.handle_key(ctrl('o'), start);
    assert!(!app.popup().is_open());
    assert_eq!(app.status_message(), "Only expressions open in the editor.");
}

#[test]
fn escape_closes_suggestions_before_the_popup() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);
    open_popup(&mut app, start);

    app.handle_key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::CONTROL), start);
    assert!(connector.log().contains(&"complete 0:1".to_string()));
    connector.push(ServerMessage::Completions(vec![
        completion("amount"),
        completion("approved"),
    ]));
    app.tick(start);
    let editor = app.popup().editor().expect("open");
    assert!(editor.completion_active());

    app.handle_key(key(KeyCode::Esc), start);
    assert!(app.popup().is_open(), "first Esc only hides the suggestions");
    assert!(!app.popup().editor().expect("open").completion_active());

    app.handle_key(key(KeyCode::Esc), start);
    assert!(!app.popup().is_open());
    app.tick(start);
    assert!(!app.fields()[0].is_popup_owned());
    assert_eq!(app.focused_field().map(|id| id.as_str()), Some("condition"));
}

#[test]
fn backspace_at_the_start_demotes_and_closes_the_popup() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);
    open_popup(&mut app, start);

    app.handle_key(key(KeyCode::Home), start);
    app.handle_key(key(KeyCode::Backspace), start);
    assert!(!app.popup().is_open());
    assert_eq!(app.fields()[0].mode(), EditMode::Plain);
    assert_eq!(app.fields()[0].buffer(), "a");
}

#[test]
fn toggling_to_plain_closes_the_owning_popup() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);
    open_popup(&mut app, start);

    app.handle_action(KeyAction::ToggleExpression, start);
    assert!(!app.popup().is_open());
    assert_eq!(app.fields()[0].mode(), EditMode::Plain);
}

#[test]
fn element_change_closes_the_popup_and_restores_focus() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);
    open_popup(&mut app, start);

    app.handle_action(KeyAction::ElementStep(1), start);
    assert!(!app.popup().is_open());
    assert_eq!(app.popup().source(), None);

    app.tick(start);
    assert_eq!(app.current_element(), Some("task_2"));
    assert_eq!(app.focused_field().map(|id| id.as_str()), Some("condition"));
    assert!(!app.fields()[0].is_popup_owned());
}

#[test]
fn lifecycle_events_split_across_ticks() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    app.popup_events().on_any(move |event| {
        sink.borrow_mut()
            .push(format!("{} {}", event.kind().name(), event.field()));
    });

    app.handle_key(ctrl('o'), start);
    assert_eq!(*log.borrow(), ["popup.open condition"]);
    app.tick(start);
    app.handle_key(ctrl('o'), start);
    assert_eq!(
        *log.borrow(),
        [
            "popup.open condition",
            "popup.opened condition",
            "popup.close condition"
        ]
    );
    app.tick(start);
    assert_eq!(log.borrow().last().map(String::as_str), Some("popup.closed condition"));
    assert_eq!(connector.closed(), 1, "the popup connection closed once");
}

#[test]
fn posted_requests_open_and_close_the_popup() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut app = app(&connector);

    let plain = app.fields()[1]
        .popup_config(Some("Task"), None)
        .expect("language configured");
    app.popup_events().post(PopupRequest::Open {
        field: "name".into(),
        config: plain,
        return_focus: "name".into(),
    });
    app.tick(start);
    assert!(!app.popup().is_open(), "plain fields ignore open requests");

    let config = app.fields()[0]
        .popup_config(Some("Task"), None)
        .expect("language configured");
    app.popup_events().post(PopupRequest::Open {
        field: "condition".into(),
        config,
        return_focus: "condition".into(),
    });
    assert!(!app.popup().is_open(), "requests wait for the next tick");
    app.tick(start);
    assert!(app.popup().is_open_for(&"condition".into()));
    assert!(app.fields()[0].is_popup_owned());
    assert!(app.popup_events().is_popup_open());

    app.popup_events().post(PopupRequest::Close {
        field: Some("name".into()),
    });
    app.tick(start);
    assert!(app.popup().is_open(), "only the owning field closes the popup");

    app.popup_events().post(PopupRequest::Close {
        field: Some("condition".into()),
    });
    app.tick(start);
    assert!(!app.popup().is_open());
    assert!(!app.popup_events().is_popup_open());
    assert!(!app.fields()[0].is_popup_owned());
    assert_eq!(app.focused_field().map(|id| id.as_str()), Some("condition"));
}
