use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::domain::{EditMode, FieldDefinition};
use crate::form::{ClipboardData, ExpressionFieldController, FocusTarget, Surface, TEXT_FORMAT};
use crate::lsp::OfflineConnector;
use crate::tests::support::{MemoryBinding, feel_language};

fn field(value: Option<&str>) -> ExpressionFieldController {
    ExpressionFieldController::new(
        FieldDefinition::new("condition", "Condition").with_language(feel_language()),
        value,
        Rc::new(OfflineConnector),
        Duration::from_millis(300),
    )
    .expect("field mounts")
}

fn expression_clipboard(text: &str) -> ClipboardData {
    let mut data = ClipboardData::with_text(text);
    data.set_data("application/feel", text);
    data
}

#[test]
fn pasting_a_copied_expression_promotes_on_the_next_tick() {
    let start = Instant::now();
    let mut binding = MemoryBinding::default();
    let mut field = field(None);
    field.focus(FocusTarget::End);
    field.tick(start, &mut binding);

    assert!(field.on_paste(&expression_clipboard("a + b"), start));
    assert_eq!((field.mode(), field.buffer()), (EditMode::Plain, "a + b"));

    field.tick(start, &mut binding);
    assert_eq!((field.mode(), field.buffer()), (EditMode::Expression, "=a + b"));

    field.tick(start, &mut binding);
    let Surface::Structured(editor) = field.surface() else {
        panic!("expected the structured editor");
    };
    assert!(editor.is_focused());
    assert_eq!(editor.document().caret(), 5);

    field.tick(start + Duration::from_secs(1), &mut binding);
    assert_eq!(binding.committed_values(), [Some("=a + b")]);
}

#[test]
fn plain_text_paste_stays_plain() {
    let start = Instant::now();
    let mut binding = MemoryBinding::default();
    let mut field = field(Some("x"));
    field.focus(FocusTarget::End);
    field.tick(start, &mut binding);

    field.on_paste(&ClipboardData::with_text(" + 1"), start);
    field.tick(start, &mut binding);
    assert_eq!((field.mode(), field.buffer()), (EditMode::Plain, "x + 1"));
}

#[test]
fn copying_an_expression_carries_its_language_format() {
    let field = field(Some("=a + b"));
    let mut data = ClipboardData::new();
    field.on_copy(&mut data);
    assert_eq!(data.text(), Some("a + b"));
    assert_eq!(data.data("application/feel"), Some("a + b"));

    let plain = self::field(Some("abc"));
    let mut data = ClipboardData::new();
    plain.on_copy(&mut data);
    assert_eq!(data.formats().collect::<Vec<_>>(), [TEXT_FORMAT]);
}

#[test]
fn cutting_plain_text_clears_the_field() {
    let start = Instant::now();
    let mut binding = MemoryBinding::with_value("condition", Some("abc"));
    let mut field = field(Some("abc"));
    let mut data = ClipboardData::new();
    field.on_cut(&mut data, start);
    assert_eq!(data.text(), Some("abc"));
    assert_eq!(field.buffer(), "");
    field.tick(start + Duration::from_secs(1), &mut binding);
    assert_eq!(binding.committed_values(), [None]);
}
