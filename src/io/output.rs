//! Writing saved panel values.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
#[cfg(feature = "toml")]
use serde_json::Value;

use super::DocumentFormat;

#[derive(Debug, Clone)]
pub enum OutputDestination {
    Stdout,
    File(PathBuf),
}

impl OutputDestination {
    pub fn file(path: impl AsRef<Path>) -> Self {
        OutputDestination::File(path.as_ref().to_path_buf())
    }

    fn write(&self, payload: &str) -> io::Result<()> {
        match self {
            OutputDestination::Stdout => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{payload}")?;
                stdout.flush()
            }
            OutputDestination::File(path) => fs::write(path, format!("{payload}\n")),
        }
    }

    fn describe(&self) -> String {
        match self {
            OutputDestination::Stdout => "stdout".to_string(),
            OutputDestination::File(path) => path.display().to_string(),
        }
    }
}

/// Format and destinations for the values returned by a saved panel.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: DocumentFormat,
    pub pretty: bool,
    pub destinations: Vec<OutputDestination>,
}

impl OutputOptions {
    /// Pretty output to stdout.
    pub fn new(format: DocumentFormat) -> Self {
        Self {
            format,
            pretty: true,
            destinations: vec![OutputDestination::Stdout],
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_destinations(mut self, destinations: Vec<OutputDestination>) -> Self {
        self.destinations = destinations;
        self
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self::new(DocumentFormat::Json)
    }
}

/// Serializes `values` in the configured format.
pub fn render<T: Serialize + ?Sized>(values: &T, options: &OutputOptions) -> Result<String> {
    let value = serde_json::to_value(values).context("failed to serialize values")?;
    match options.format {
        DocumentFormat::Json if options.pretty => {
            serde_json::to_string_pretty(&value).context("failed to serialize JSON")
        }
        DocumentFormat::Json => serde_json::to_string(&value).context("failed to serialize JSON"),
        #[cfg(feature = "yaml")]
        DocumentFormat::Yaml => serde_yaml::to_string(&value).context("failed to serialize YAML"),
        #[cfg(feature = "toml")]
        DocumentFormat::Toml => {
            // TOML has no null; unset fields are left out.
            let value = without_nulls(value);
            let rendered = if options.pretty {
                toml::to_string_pretty(&value)
            } else {
                toml::to_string(&value)
            };
            rendered.context("failed to serialize TOML")
        }
    }
}

/// Writes `values` to every configured destination.
pub fn emit<T: Serialize + ?Sized>(values: &T, options: &OutputOptions) -> Result<()> {
    if options.destinations.is_empty() {
        return Ok(());
    }
    let payload = render(values, options)?;
    for destination in &options.destinations {
        destination
            .write(&payload)
            .with_context(|| format!("failed to write values to {}", destination.describe()))?;
    }
    Ok(())
}

#[cfg(feature = "toml")]
fn without_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key, without_nulls(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(without_nulls).collect()),
        other => other,
    }
}
