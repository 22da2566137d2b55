//! Integer data type with bounds and step.

use serde::Deserialize;
use serde_json::Value;

use super::{json_type_name, parse_validation, DataType, TypeKey, DEFAULT_TYPE_VERSION};
use crate::error::{FieldError, ValidationErrors};
use crate::value::OptionalValue;

pub(super) const NAME: &str = "Integer";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IntegerSpec {
    min_value: Option<i64>,
    max_value: Option<i64>,
    step: Option<i64>,
}

/// Signed 64-bit integers.
///
/// Validation keys: `minValue`, `maxValue`, `step`. With a step, a value must
/// satisfy `(value - min) % step == 0`, `min` defaulting to 0.
#[derive(Debug, Clone)]
pub struct IntegerType {
    spec: IntegerSpec,
    default: OptionalValue,
}

impl IntegerType {
    pub(super) fn factory(
        validation: &Value,
        default: &OptionalValue,
    ) -> Result<Box<dyn DataType>, ValidationErrors> {
        let spec: IntegerSpec = parse_validation(validation)?;
        Ok(Box::new(Self {
            spec,
            default: default.clone(),
        }))
    }

    fn as_integer(value: &Value) -> Result<i64, String> {
        if let Some(i) = value.as_i64() {
            return Ok(i);
        }
        match value.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Ok(f as i64)
            }
            Some(f) => Err(format!("{} is not an integer", f)),
            None => Err(format!("expected integer, got {}", json_type_name(value))),
        }
    }
}

impl DataType for IntegerType {
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
        if let Some(step) = self.spec.step {
            if step <= 0 {
                errors.push(FieldError::new(
                    "validation.step",
                    format!("step must be positive, got {}", step),
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
        let v = Self::as_integer(value)?;
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
        if let Some(step) = self.spec.step.filter(|s| *s > 0) {
            let base = self.spec.min_value.unwrap_or(0);
            if (v as i128 - base as i128) % step as i128 != 0 {
                return Err(format!("{} is not a multiple of step {} from {}", v, step, base));
            }
        }
        Ok(())
    }

    /// The explicit default, else the in-range value closest to zero that
    /// lands on the step.
    fn default_value(&self) -> Result<Value, String> {
        if let Some(default) = self.default.as_json() {
            return Ok(default);
        }
        let min = self.spec.min_value.map(i128::from);
        let max = self.spec.max_value.map(i128::from);
        let mut target = 0i128;
        if let Some(min) = min {
            target = target.max(min);
        }
        if let Some(max) = max {
            target = target.min(max);
        }

        let candidates = match self.spec.step.filter(|s| *s > 0).map(i128::from) {
            Some(step) => {
                let base = min.unwrap_or(0);
                let below = base + (target - base).div_euclid(step) * step;
                [below, if below == target { below } else { below + step }]
            }
            None => [target, target],
        };
        candidates
            .into_iter()
            .filter(|v| min.map_or(true, |m| *v >= m) && max.map_or(true, |m| *v <= m))
            .min_by_key(|v| v.abs())
            .and_then(|v| i64::try_from(v).ok())
            .map(Value::from)
            .ok_or_else(|| "no integer satisfies minValue, maxValue and step".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(validation: Value, default: Option<Value>) -> Box<dyn DataType> {
        let default = default.map(|d| OptionalValue::from_json(&d)).unwrap_or_default();
        IntegerType::factory(&validation, &default).unwrap()
    }

    #[test]
    fn test_bounds() {
        let t = build(json!({"minValue": 1, "maxValue": 10}), None);
        assert!(t.validate_value(&json!(1)).is_ok());
        assert!(t.validate_value(&json!(10)).is_ok());
        assert!(t.validate_value(&json!(0)).is_err());
        assert!(t.validate_value(&json!(11)).is_err());
    }

    #[test]
    fn test_type_checks() {
        let t = build(Value::Null, None);
        assert!(t.validate_value(&json!(5.0)).is_ok());
        assert!(t.validate_value(&json!(5.5)).is_err());
        assert!(t.validate_value(&json!("5")).is_err());
        assert!(t.validate_value(&json!(true)).is_err());
    }

    #[test]
    fn test_step_from_min() {
        let t = build(json!({"minValue": 1, "step": 3}), None);
        assert!(t.validate_value(&json!(1)).is_ok());
        assert!(t.validate_value(&json!(7)).is_ok());
        assert!(t.validate_value(&json!(6)).is_err());

        let no_min = build(json!({"step": 5}), None);
        assert!(no_min.validate_value(&json!(-10)).is_ok());
        assert!(no_min.validate_value(&json!(12)).is_err());
    }

    #[test]
    fn test_spec_validation_checks_default() {
        let t = build(json!({"minValue": 0, "maxValue": 10}), Some(json!(12)));
        let errors = t.validate_spec();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "default");
    }

    #[test]
    fn test_spec_validation_checks_ordering_and_step() {
        let t = build(json!({"minValue": 5, "maxValue": 1, "step": 0}), None);
        let fields: Vec<String> = t.validate_spec().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["validation.maxValue", "validation.step"]);
    }

    #[test]
    fn test_unknown_constraint_rejected() {
        let err = IntegerType::factory(&json!({"max": 3}), &OptionalValue::unset()).unwrap_err();
        assert!(err.has_field("validation"));
    }

    #[test]
    fn test_default_value() {
        assert_eq!(build(json!({"minValue": 3}), None).default_value().unwrap(), json!(3));
        assert_eq!(build(json!({"maxValue": -2}), None).default_value().unwrap(), json!(-2));
        assert_eq!(build(Value::Null, None).default_value().unwrap(), json!(0));
        assert_eq!(build(Value::Null, Some(json!(9))).default_value().unwrap(), json!(9));
    }

    #[test]
    fn test_default_value_lands_on_step() {
        let cases = [
            (json!({"maxValue": -3, "step": 2}), json!(-4)),
            (json!({"minValue": 1, "step": 3}), json!(1)),
            (json!({"minValue": -10, "maxValue": 10, "step": 3}), json!(-1)),
            (json!({"minValue": -7, "maxValue": -1, "step": 4}), json!(-3)),
            (json!({"step": 5}), json!(0)),
        ];
        for (validation, expected) in cases {
            let t = build(validation.clone(), None);
            let default = t.default_value().unwrap();
            assert_eq!(default, expected, "{}", validation);
            assert!(t.validate_value(&default).is_ok(), "{}", validation);
        }
    }

    #[test]
    fn test_default_value_refused_for_empty_range() {
        let t = build(json!({"minValue": 5, "maxValue": 1}), None);
        assert!(t.default_value().is_err());
    }
}
