//! Floating point data type.

use serde::Deserialize;
use serde_json::Value;

use super::{json_type_name, parse_validation, DataType, TypeKey, DEFAULT_TYPE_VERSION};
use crate::error::{FieldError, ValidationErrors};
use crate::value::OptionalValue;

pub(super) const NAME: &str = "Decimal";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DecimalSpec {
    min_value: Option<f64>,
    max_value: Option<f64>,
}

/// 64-bit floating point numbers with optional inclusive bounds.
#[derive(Debug, Clone)]
pub struct DecimalType {
    spec: DecimalSpec,
    default: OptionalValue,
}

impl DecimalType {
    pub(super) fn factory(
        validation: &Value,
        default: &OptionalValue,
    ) -> Result<Box<dyn DataType>, ValidationErrors> {
        let spec: DecimalSpec = parse_validation(validation)?;
        Ok(Box::new(Self {
            spec,
            default: default.clone(),
        }))
    }
}

impl DataType for DecimalType {
    fn key(&self) -> TypeKey {
        TypeKey::new(NAME, DEFAULT_TYPE_VERSION)
    }

    fn validate_spec(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let (Some(min), Some(max)) = (self.spec.min_value, self.spec.max_value) {
            if min > max {
                errors.push(FieldError::new(
                    "validation.maxValue",
                    format!("maxValue {} is less than minValue {}", max, min),
                ));
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
        let v = value
            .as_f64()
            .ok_or_else(|| format!("expected number, got {}", json_type_name(value)))?;
        if let Some(min) = self.spec.min_value {
            if v < min {
                return Err(format!("{} is less than minValue {}", v, min));
            }
        }
        if let Some(max) = self.spec.max_value {
            if v > max {
                return Err(format!("{} is greater than maxValue {}", v, max));
            }
        }
        Ok(())
    }

    fn default_value(&self) -> Result<Value, String> {
        if let Some(default) = self.default.as_json() {
            return Ok(default);
        }
        let mut target = 0.0f64;
        if let Some(min) = self.spec.min_value {
            target = target.max(min);
        }
        if let Some(max) = self.spec.max_value {
            target = target.min(max);
        }
        let value = Value::from(target);
        self.validate_value(&value)?;
        Ok(value)
    }
}
