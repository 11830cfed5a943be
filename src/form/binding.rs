use anyhow::{Context, Result};
use jsonschema::{Validator, validator_for};
use serde_json::Value;

use crate::domain::{FieldId, codec};

/// Where committed field values live. The controller reads the current value and writes a new
/// one only when the encoded value actually changed.
pub trait PropertyBinding {
    fn get_value(&self, field: &FieldId) -> Option<String>;
    fn set_value(&mut self, field: &FieldId, value: Option<String>, validation_error: Option<String>);
}

/// Pure check over a committed value. `None` means the value is acceptable.
pub trait Validate {
    fn validate(&self, value: Option<&str>) -> Option<String>;
}

impl<F> Validate for F
where
    F: Fn(Option<&str>) -> Option<String>,
{
    fn validate(&self, value: Option<&str>) -> Option<String> {
        self(value)
    }
}

/// Validates plain committed values against a JSON Schema.
///
/// Expressions are only known at evaluation time and always pass.
#[derive(Debug)]
pub struct SchemaValidator {
    validator: Validator,
}

impl SchemaValidator {
    pub fn new(schema: &Value) -> Result<Self> {
        let validator = validator_for(schema).context("failed to compile field validation schema")?;
        Ok(Self { validator })
    }
}

impl Validate for SchemaValidator {
    fn validate(&self, value: Option<&str>) -> Option<String> {
        let instance = match value {
            Some(text) if codec::is_expression(text) => return None,
            Some(text) => Value::String(text.to_string()),
            None => Value::Null,
        };
        self.validator
            .iter_errors(&instance)
            .next()
            .map(|error| error.to_string())
    }
}
