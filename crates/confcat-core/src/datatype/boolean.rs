//! Boolean data type.

use serde::Deserialize;
use serde_json::Value;

use super::{json_type_name, parse_validation, DataType, TypeKey, DEFAULT_TYPE_VERSION};
use crate::error::{FieldError, ValidationErrors};
use crate::value::OptionalValue;

pub(super) const NAME: &str = "Boolean";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BooleanSpec {}

/// `true` or `false`; takes no constraints.
#[derive(Debug, Clone)]
pub struct BooleanType {
    default: OptionalValue,
}

impl BooleanType {
    pub(super) fn factory(
        validation: &Value,
        default: &OptionalValue,
    ) -> Result<Box<dyn DataType>, ValidationErrors> {
        let _: BooleanSpec = parse_validation(validation)?;
        Ok(Box::new(Self {
            default: default.clone(),
        }))
    }
}

impl DataType for BooleanType {
    fn key(&self) -> TypeKey {
        TypeKey::new(NAME, DEFAULT_TYPE_VERSION)
    }

    fn validate_spec(&self) -> Vec<FieldError> {
        match self.default.as_json() {
            Some(default) => self
                .validate_value(&default)
                .err()
                .map(|msg| vec![FieldError::new("default", msg)])
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn validate_value(&self, value: &Value) -> Result<(), String> {
        if value.is_boolean() {
            Ok(())
        } else {
            Err(format!("expected boolean, got {}", json_type_name(value)))
        }
    }

    fn default_value(&self) -> Result<Value, String> {
        Ok(self.default.as_json().unwrap_or(Value::Bool(false)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean() {
        let t = BooleanType::factory(&json!({}), &OptionalValue::from_json(&json!(true))).unwrap();
        assert!(t.validate_spec().is_empty());
        assert!(t.validate_value(&json!(false)).is_ok());
        assert!(t.validate_value(&json!(0)).is_err());
        assert_eq!(t.default_value().unwrap(), json!(true));
        assert!(BooleanType::factory(&json!({"x": 1}), &OptionalValue::unset()).is_err());
    }
}
