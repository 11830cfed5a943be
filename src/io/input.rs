use anyhow::{Context, Result};
use serde_json::Value;

use crate::domain::PanelDocument;

use super::DocumentFormat;

/// Parse structured data in any supported format into a `serde_json::Value`.
pub fn parse_document_str(contents: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => {
            serde_json::from_str::<Value>(contents).with_context(|| "failed to parse JSON document")
        }
        #[cfg(feature = "yaml")]
        DocumentFormat::Yaml => {
            serde_yaml::from_str::<Value>(contents).with_context(|| "failed to parse YAML document")
        }
        #[cfg(feature = "toml")]
        DocumentFormat::Toml => contents
            .parse::<toml::Value>()
            .with_context(|| "failed to parse TOML document")
            .and_then(|value| {
                serde_json::to_value(value).context("failed to convert TOML to JSON")
            }),
    }
}

/// Parse and check a panel document.
pub fn parse_panel_document(contents: &str, format: DocumentFormat) -> Result<PanelDocument> {
    let value = parse_document_str(contents, format)?;
    panel_document_from_value(value)
}

pub fn panel_document_from_value(value: Value) -> Result<PanelDocument> {
    let document: PanelDocument =
        serde_json::from_value(value).context("document does not describe a properties panel")?;
    document.check()?;
    Ok(document)
}
