use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use lspfield::form::SchemaValidator;
use lspfield::{
    EditMode, ExpressionFieldController, FieldDefinition, FieldId, LanguageSettings,
    OfflineConnector, PropertyBinding,
};
use serde_json::json;

#[derive(Default)]
struct Properties {
    values: HashMap<FieldId, Option<String>>,
    errors: Vec<Option<String>>,
}

impl PropertyBinding for Properties {
    fn get_value(&self, field: &FieldId) -> Option<String> {
        self.values.get(field).cloned().flatten()
    }

    fn set_value(&mut self, field: &FieldId, value: Option<String>, validation_error: Option<String>) {
        self.values.insert(field.clone(), value);
        self.errors.push(validation_error);
    }
}

fn definition() -> FieldDefinition {
    FieldDefinition::new("retries", "Retries").with_language(LanguageSettings {
        language_id: Some("feel".into()),
        server_uri: Some("tcp://127.0.0.1:9".into()),
        ..LanguageSettings::default()
    })
}

fn controller(value: Option<&str>) -> ExpressionFieldController {
    ExpressionFieldController::new(
        definition(),
        value,
        Rc::new(OfflineConnector),
        Duration::from_millis(50),
    )
    .expect("field mounts")
}

#[test]
fn edits_reach_the_binding_through_the_public_api() {
    let start = Instant::now();
    let mut properties = Properties::default();
    let mut field = controller(None);

    field.on_local_edit("3", start);
    field.tick(start + Duration::from_millis(60), &mut properties);
    assert_eq!(
        properties.get_value(&FieldId::from("retries")).as_deref(),
        Some("3")
    );

    assert!(field.toggle_mode(start));
    assert!(field.flush(&mut properties));
    assert_eq!(
        properties.get_value(&FieldId::from("retries")).as_deref(),
        Some("=3")
    );
}

#[test]
fn schema_validation_reports_plain_values_only() {
    let start = Instant::now();
    let validator = SchemaValidator::new(&json!({"type": "string", "pattern": "^[0-9]+$"}))
        .expect("schema compiles");
    let mut properties = Properties::default();
    let mut field = controller(Some("abc")).with_validator(Rc::new(validator));
    assert!(field.displayed_error().is_some(), "mount validates the initial value");

    field.toggle_mode(start);
    assert_eq!(field.mode(), EditMode::Expression);
    field.flush(&mut properties);
    assert_eq!(properties.errors, [None]);
    assert_eq!(field.displayed_error(), None);
}

#[test]
fn expressions_without_a_language_server_do_not_mount() {
    let result = ExpressionFieldController::new(
        FieldDefinition::new("name", "Name"),
        Some("=a"),
        Rc::new(OfflineConnector),
        Duration::ZERO,
    );
    assert!(result.is_err());

    let plain = ExpressionFieldController::new(
        FieldDefinition::new("name", "Name"),
        Some("text"),
        Rc::new(OfflineConnector),
        Duration::ZERO,
    )
    .expect("plain values need no language");
    assert!(!plain.can_toggle());
}
