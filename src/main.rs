use lspfield::prelude::*;

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() -> AppResult<()> {
    let document = PanelDocument::new(vec![
        FieldDefinition::new("name", "Name").with_placeholder("Unnamed task"),
        FieldDefinition::new("condition", "Condition").with_placeholder("amount > 100"),
        FieldDefinition::new("assignee", "Assignee"),
    ])
    .with_language(LanguageSettings {
        language_id: Some("feel".into()),
        server_uri: Some("tcp://127.0.0.1:7001".into()),
        ..LanguageSettings::default()
    })
    .with_element(
        ElementRecord::new("Task_1")
            .with_kind("UserTask")
            .with_label("Review order")
            .with_value("name", Some("Review order"))
            .with_value("condition", Some("=order.total > 100"))
            .with_value("assignee", Some("=initiator")),
    )
    .with_element(
        ElementRecord::new("Flow_2")
            .with_kind("SequenceFlow")
            .with_value("condition", Some("=approved")),
    );

    let outcome = PropertiesPanel::new(document)
        .with_title("lspfield demo")
        .run()?;
    lspfield::emit(&outcome.values, &OutputOptions::default())?;
    Ok(())
}
