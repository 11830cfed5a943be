use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;

use crate::domain::{FieldId, PanelDocument};
use crate::form::{SchemaValidator, Validate};
use crate::lsp::{LanguageConnector, ServerConnector};

use super::{options::PanelOptions, runtime::App, store::PanelValues};

/// Values returned by a saved panel session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelOutcome {
    pub values: PanelValues,
}

impl PanelOutcome {
    pub fn value(&self, element: &str, field: &str) -> Option<&str> {
        self.values
            .get(element)
            .and_then(|values| values.get(field))
            .and_then(|value| value.as_deref())
    }
}

/// Terminal properties panel over a [`PanelDocument`].
pub struct PropertiesPanel {
    document: PanelDocument,
    title: Option<String>,
    options: PanelOptions,
    connector: Rc<dyn LanguageConnector>,
    validators: HashMap<FieldId, Rc<dyn Validate>>,
}

impl std::fmt::Debug for PropertiesPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertiesPanel")
            .field("title", &self.title)
            .field("options", &self.options)
            .field("fields", &self.document.fields.len())
            .field("elements", &self.document.elements.len())
            .finish_non_exhaustive()
    }
}

impl PropertiesPanel {
    pub fn new(document: PanelDocument) -> Self {
        Self {
            document,
            title: None,
            options: PanelOptions::default(),
            connector: Rc::new(ServerConnector::new()),
            validators: HashMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_options(mut self, options: PanelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_connector(mut self, connector: impl LanguageConnector + 'static) -> Self {
        self.connector = Rc::new(connector);
        self
    }

    /// Validates committed values of `field`, replacing the rule from its definition.
    pub fn with_validator(
        mut self,
        field: impl Into<FieldId>,
        validator: impl Validate + 'static,
    ) -> Self {
        self.validators.insert(field.into(), Rc::new(validator));
        self
    }

    pub fn run(self) -> Result<PanelOutcome> {
        let mut app = self.into_app()?;
        let values = app.run()?;
        Ok(PanelOutcome { values })
    }

    pub(crate) fn into_app(self) -> Result<App> {
        let PropertiesPanel {
            document,
            title,
            options,
            connector,
            mut validators,
        } = self;
        for field in &document.fields {
            if validators.contains_key(&field.id) {
                continue;
            }
            if let Some(schema) = &field.validation {
                let validator = SchemaValidator::new(schema)?;
                validators.insert(field.id.clone(), Rc::new(validator));
            }
        }
        App::new(document, title, options, connector, validators)
    }
}
