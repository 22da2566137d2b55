//! String data type.

use serde::Deserialize;
use serde_json::Value;

use super::{json_type_name, parse_validation, DataType, TypeKey, DEFAULT_TYPE_VERSION};
use crate::error::{FieldError, ValidationErrors};
use crate::value::OptionalValue;

pub(super) const NAME: &str = "String";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StringSpec {
    min_length: Option<usize>,
    max_length: Option<usize>,
    #[serde(default)]
    allowed_values: Vec<String>,
}

/// UTF-8 strings; lengths count characters.
#[derive(Debug, Clone)]
pub struct StringType {
    spec: StringSpec,
    default: OptionalValue,
}

impl StringType {
    pub(super) fn factory(
        validation: &Value,
        default: &OptionalValue,
    ) -> Result<Box<dyn DataType>, ValidationErrors> {
        let spec: StringSpec = parse_validation(validation)?;
        Ok(Box::new(Self {
            spec,
            default: default.clone(),
        }))
    }
}

impl DataType for StringType {
    fn key(&self) -> TypeKey {
        TypeKey::new(NAME, DEFAULT_TYPE_VERSION)
    }

    fn validate_spec(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let (Some(min), Some(max)) = (self.spec.min_length, self.spec.max_length) {
            if min > max {
                errors.push(FieldError::new(
                    "validation.maxLength",
                    format!("maxLength {} is less than minLength {}", max, min),
                ));
            }
        }
        for (i, allowed) in self.spec.allowed_values.iter().enumerate() {
            if let Err(msg) = self.check_length(allowed) {
                errors.push(FieldError::new(format!("validation.allowedValues.{}", i), msg));
            }
        }
        if let Some(default) = self.default.as_json() {
            if let Err(msg) = self.validate_value(&default) {
                errors.push(FieldError::new("default", msg));
            }
        }
        errors
    }

    fn validate_value(&self, value: &Value) -> Result<(), String> {
        let s = value
            .as_str()
            .ok_or_else(|| format!("expected string, got {}", json_type_name(value)))?;
        self.check_length(s)?;
        if !self.spec.allowed_values.is_empty() && !self.spec.allowed_values.iter().any(|a| a == s) {
            return Err(format!(
                "'{}' is not one of [{}]",
                s,
                self.spec.allowed_values.join(", ")
            ));
        }
        Ok(())
    }

    /// The explicit default, else the first allowed value, else the empty
    /// string when the length bounds admit it.
    fn default_value(&self) -> Result<Value, String> {
        if let Some(default) = self.default.as_json() {
            return Ok(default);
        }
        let value = match self.spec.allowed_values.first() {
            Some(first) => first.clone(),
            None => {
                self.check_length("").map_err(|msg| format!("no default value: {}", msg))?;
                String::new()
            }
        };
        Ok(Value::String(value))
    }
}

impl StringType {
    fn check_length(&self, s: &str) -> Result<(), String> {
        let len = s.chars().count();
        if let Some(min) = self.spec.min_length {
            if len < min {
                return Err(format!("length {} is less than minLength {}", len, min));
            }
        }
        if let Some(max) = self.spec.max_length {
            if len > max {
                return Err(format!("length {} is greater than maxLength {}", len, max));
            }
        }
        Ok(())
    }
}
