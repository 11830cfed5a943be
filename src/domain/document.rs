use anyhow::{Result, bail};
use indexmap::IndexMap;
use schemars::{JsonSchema, schema::RootSchema, schema_for};
use serde::{Deserialize, Serialize};

use super::field::{ElementId, FieldDefinition, FieldId, LanguageSettings, PopupLink};

/// Everything a panel needs: field definitions shared by all elements and the per-element values.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PanelDocument {
    #[serde(default)]
    pub title: Option<String>,
    /// Defaults applied to every field that leaves a language setting unset.
    #[serde(default)]
    pub language: LanguageSettings,
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub elements: Vec<ElementRecord>,
    /// Links listed in the popup title, keyed by language id.
    #[serde(default)]
    pub popup_links: IndexMap<String, Vec<PopupLink>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    pub id: ElementId,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub values: IndexMap<FieldId, Option<String>>,
}

impl ElementRecord {
    pub fn new(id: impl Into<ElementId>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            label: None,
            values: IndexMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, field: impl Into<FieldId>, value: Option<&str>) -> Self {
        self.values.insert(field.into(), value.map(str::to_string));
        self
    }

    pub fn value(&self, field: &FieldId) -> Option<&str> {
        self.values.get(field).and_then(|value| value.as_deref())
    }
}

impl PanelDocument {
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self {
            title: None,
            language: LanguageSettings::default(),
            fields,
            elements: Vec::new(),
            popup_links: IndexMap::new(),
        }
    }

    pub fn with_language(mut self, language: LanguageSettings) -> Self {
        self.language = language;
        self
    }

    pub fn with_element(mut self, element: ElementRecord) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_popup_link(mut self, language_id: impl Into<String>, link: PopupLink) -> Self {
        self.popup_links.entry(language_id.into()).or_default().push(link);
        self
    }

    /// Language settings of `field` with the document defaults applied.
    pub fn language_for(&self, field: &FieldDefinition) -> LanguageSettings {
        field.language.merged_with(&self.language)
    }

    /// Rejects documents that could never mount: duplicate ids or no elements. Language
    /// settings are checked when a field first needs its structured editor.
    pub fn check(&self) -> Result<()> {
        if self.elements.is_empty() {
            bail!("document declares no elements to edit");
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.id.clone()) {
                bail!("duplicate field id '{}'", field.id);
            }
        }
        let mut elements = std::collections::HashSet::new();
        for element in &self.elements {
            if !elements.insert(element.id.clone()) {
                bail!("duplicate element id '{}'", element.id);
            }
        }
        Ok(())
    }

    pub fn json_schema() -> RootSchema {
        schema_for!(PanelDocument)
    }
}
