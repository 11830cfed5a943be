use std::rc::Rc;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use crate::domain::{EditMode, FieldDefinition};
use crate::form::{ExpressionFieldController, FocusRequest, FocusTarget, Surface};
use crate::lsp::{ServerMessage, StructuredEditorSession};
use crate::tests::support::{
    MemoryBinding, RecordingConnector, error_diagnostic, feel_language, key,
};

const DEBOUNCE: Duration = Duration::from_millis(300);

fn condition() -> FieldDefinition {
    FieldDefinition::new("condition", "Condition").with_language(feel_language())
}

fn mount(value: Option<&str>, connector: &RecordingConnector) -> ExpressionFieldController {
    ExpressionFieldController::new(condition(), value, Rc::new(connector.clone()), DEBOUNCE)
        .expect("field mounts")
}

fn editor(controller: &ExpressionFieldController) -> &StructuredEditorSession {
    match controller.surface() {
        Surface::Structured(editor) => editor,
        Surface::Plain(_) => panic!("expected the structured editor"),
    }
}

fn plain_caret(controller: &ExpressionFieldController) -> (usize, bool) {
    match controller.surface() {
        Surface::Plain(input) => (input.caret(), input.is_focused()),
        Surface::Structured(_) => panic!("expected the plain input"),
    }
}

#[test]
fn toggling_twice_restores_the_value_without_committing() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut binding = MemoryBinding::with_value("condition", Some("abc"));
    let mut field = mount(Some("abc"), &connector);

    assert!(field.toggle_mode(start));
    assert_eq!(field.buffer(), "=abc");
    assert!(field.toggle_mode(start));
    assert_eq!((field.mode(), field.buffer()), (EditMode::Plain, "abc"));

    field.tick(start + Duration::from_secs(1), &mut binding);
    assert!(binding.commits().is_empty());
}

#[test]
fn toggling_to_expression_places_the_caret_after_the_text() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut binding = MemoryBinding::with_value("condition", Some("abc"));
    let mut field = mount(Some("abc"), &connector);
    field.focus(FocusTarget::End);
    field.tick(start, &mut binding);

    field.toggle_mode(start);
    assert_eq!(
        field.pending_focus(),
        FocusRequest::Pending(FocusTarget::Offset(4)),
        "focus waits for the new surface"
    );
    field.tick(start, &mut binding);
    let editor = editor(&field);
    assert!(editor.is_focused());
    assert_eq!(editor.document().caret(), 3);
}

#[test]
fn clearing_an_expression_from_outside_keeps_expression_mode() {
    let connector = RecordingConnector::default();
    let mut field = mount(Some("=a"), &connector);
    field.sync_external(None);
    assert_eq!(field.mode(), EditMode::Expression);
    assert_eq!(field.buffer(), "=");
    assert_eq!(field.display(), "");

    let mut plain = mount(Some("abc"), &connector);
    plain.sync_external(Some("=x"));
    assert_eq!((plain.mode(), plain.display()), (EditMode::Expression, "x"));
}

#[test]
fn bursts_of_edits_commit_once_after_the_quiet_period() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut binding = MemoryBinding::default();
    let mut field = mount(None, &connector);

    field.on_local_edit("a", start);
    field.on_local_edit("ab", start + Duration::from_millis(100));
    field.on_local_edit("abc", start + Duration::from_millis(200));
    assert_eq!(field.buffer(), "abc", "the buffer follows every keystroke");

    field.tick(start + Duration::from_millis(400), &mut binding);
    assert!(binding.commits().is_empty());
    field.tick(start + Duration::from_millis(500), &mut binding);
    assert_eq!(binding.committed_values(), [Some("abc")]);
    field.tick(start + Duration::from_secs(2), &mut binding);
    assert_eq!(binding.commits().len(), 1);
}

#[test]
fn external_values_cancel_the_pending_commit() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut binding = MemoryBinding::default();
    let mut field = mount(None, &connector);

    field.on_local_edit("draft", start);
    field.sync_external(Some("restored"));
    assert!(!field.has_pending_commit());
    field.tick(start + Duration::from_secs(1), &mut binding);
    assert!(binding.commits().is_empty());
    assert_eq!(field.display(), "restored");
}

#[test]
fn typed_sentinel_stays_plain_until_the_next_mount() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut binding = MemoryBinding::default();
    let mut field = mount(None, &connector);
    field.focus(FocusTarget::End);
    field.tick(start, &mut binding);

    for ch in "=1+1".chars() {
        assert!(field.handle_key(&key(KeyCode::Char(ch)), start));
    }
    assert_eq!(field.mode(), EditMode::Plain);
    assert_eq!(field.buffer(), "=1+1");
    field.tick(start + DEBOUNCE, &mut binding);
    assert_eq!(binding.committed_values(), [Some("=1+1")]);

    let remounted = mount(Some("=1+1"), &connector);
    assert_eq!(remounted.mode(), EditMode::Expression);
    assert_eq!(remounted.display(), "1+1");
}

#[test]
fn backspace_at_the_start_of_an_expression_demotes_it() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut binding = MemoryBinding::with_value("condition", Some("=x"));
    let mut field = mount(Some("=x"), &connector);
    field.focus(FocusTarget::Start);
    field.tick(start, &mut binding);
    assert_eq!(editor(&field).document().caret(), 0);

    assert!(field.handle_key(&key(KeyCode::Backspace), start));
    assert_eq!((field.mode(), field.buffer()), (EditMode::Plain, "x"));
    assert_eq!(connector.closed(), 1, "the structured editor was disposed");

    field.tick(start, &mut binding);
    assert_eq!(plain_caret(&field), (0, true));
    field.tick(start + DEBOUNCE, &mut binding);
    assert_eq!(binding.committed_values(), [Some("x")]);
}

#[test]
fn structured_edits_reach_the_server_and_the_buffer() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut binding = MemoryBinding::default();
    let mut field = mount(Some("=a"), &connector);
    field.focus(FocusTarget::End);
    field.tick(start, &mut binding);

    field.handle_key(&key(KeyCode::Char('b')), start);
    assert_eq!(field.buffer(), "=ab");
    assert_eq!(connector.log(), ["open 1 a", "change 2 ab"]);
}

#[test]
fn server_diagnostics_surface_as_a_syntax_error() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut binding = MemoryBinding::default();
    let mut field = mount(Some("=1 +"), &connector);

    connector.push(ServerMessage::Diagnostics {
        version: None,
        diagnostics: vec![error_diagnostic()],
    });
    field.tick(start, &mut binding);
    assert_eq!(field.displayed_error(), Some(crate::form::SYNTAX_ERROR_MESSAGE));

    connector.push(ServerMessage::Diagnostics {
        version: None,
        diagnostics: Vec::new(),
    });
    field.tick(start, &mut binding);
    assert_eq!(field.displayed_error(), None);
}

#[test]
fn unmount_drops_the_pending_commit_and_closes_the_connection() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut binding = MemoryBinding::default();
    let mut field = mount(Some("=a"), &connector);

    field.on_local_edit("ab", start);
    assert!(field.has_pending_commit());
    field.unmount();
    assert!(!field.has_pending_commit());
    assert_eq!(connector.closed(), 1);

    field.tick(start + Duration::from_secs(1), &mut binding);
    assert!(binding.commits().is_empty());
}

#[test]
fn disabled_fields_ignore_edits() {
    let start = Instant::now();
    let connector = RecordingConnector::default();
    let mut field = ExpressionFieldController::new(
        condition().with_disabled(true),
        Some("abc"),
        Rc::new(connector.clone()),
        DEBOUNCE,
    )
    .expect("field mounts");

    assert!(!field.can_toggle());
    assert!(!field.toggle_mode(start));
    assert!(!field.handle_key(&key(KeyCode::Char('x')), start));
    assert_eq!(field.buffer(), "abc");
}
