//! Pluggable data types for parameter values.
//!
//! A [`DataTypeRegistry`] maps a [`TypeKey`] (name and version) to a factory
//! that builds a [`DataType`] validator from a raw validation payload and an
//! optional default. The registry is an ordinary value: build it once at
//! startup, register built-ins and plugins, and pass it by reference.

mod boolean;
mod decimal;
mod integer;
mod string;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, FieldError, ValidationErrors};
use crate::value::OptionalValue;

pub use boolean::BooleanType;
pub use decimal::DecimalType;
pub use integer::IntegerType;
pub use string::StringType;

/// Version assumed when a spec does not name one.
pub const DEFAULT_TYPE_VERSION: &str = "v1";

/// Identifies a data type implementation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey {
    /// Type name, e.g. `Integer`.
    pub name: String,
    /// Type version, e.g. `v1`.
    pub version: String,
}

impl TypeKey {
    /// Create a new key.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A validator built from one data type spec.
pub trait DataType: Send + Sync + fmt::Debug {
    /// The key this validator was built for.
    fn key(&self) -> TypeKey;

    /// Check the spec itself (bounds ordering, default within bounds, ...).
    fn validate_spec(&self) -> Vec<FieldError>;

    /// Check a candidate value against the spec.
    fn validate_value(&self, value: &Value) -> Result<(), String>;

    /// The value used when nothing else is provided. Fails when no value
    /// satisfies the constraints and the spec names no default.
    fn default_value(&self) -> Result<Value, String>;

    /// Check an optional value; unset and null are accepted.
    fn validate_optional(&self, value: &OptionalValue) -> Result<(), String> {
        match value.as_json() {
            Some(v) => self.validate_value(&v),
            None => Ok(()),
        }
    }
}

/// Builds a validator from a validation payload and an optional default.
pub type DataTypeFactory =
    fn(validation: &Value, default: &OptionalValue) -> Result<Box<dyn DataType>, ValidationErrors>;

/// Registry of data type factories.
#[derive(Clone, Default)]
pub struct DataTypeRegistry {
    factories: BTreeMap<TypeKey, DataTypeFactory>,
}

impl DataTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in types registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // Keys are distinct, registration cannot collide.
        let builtins: [(&str, DataTypeFactory); 4] = [
            (integer::NAME, IntegerType::factory),
            (decimal::NAME, DecimalType::factory),
            (string::NAME, StringType::factory),
            (boolean::NAME, BooleanType::factory),
        ];
        for (name, factory) in builtins {
            registry
                .factories
                .insert(TypeKey::new(name, DEFAULT_TYPE_VERSION), factory);
        }
        registry
    }

    /// Register a factory. Fails if the key is taken.
    pub fn register(&mut self, key: TypeKey, factory: DataTypeFactory) -> Result<(), Error> {
        if self.factories.contains_key(&key) {
            return Err(Error::AlreadyExists {
                kind: "data type",
                name: key.to_string(),
            });
        }
        tracing::debug!(data_type = %key, "registered data type");
        self.factories.insert(key, factory);
        Ok(())
    }

    /// Look up a factory.
    pub fn lookup(&self, key: &TypeKey) -> Option<DataTypeFactory> {
        self.factories.get(key).copied()
    }

    /// Registered keys in deterministic order.
    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.factories.keys()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Build a validator, reporting an unknown key as a field error on `dataType`.
    pub fn build(
        &self,
        key: &TypeKey,
        validation: &Value,
        default: &OptionalValue,
    ) -> Result<Box<dyn DataType>, ValidationErrors> {
        let factory = self.lookup(key).ok_or_else(|| {
            ValidationErrors::from(FieldError::new(
                "dataType",
                format!("unsupported data type {}", key),
            ))
        })?;
        factory(validation, default)
    }
}

impl fmt::Debug for DataTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

/// Decode a validation payload; `null` means "no constraints".
pub(crate) fn parse_validation<T: DeserializeOwned + Default>(
    validation: &Value,
) -> Result<T, ValidationErrors> {
    if validation.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(validation.clone())
        .map_err(|e| ValidationErrors::from(FieldError::new("validation", e.to_string())))
}

/// Describe a JSON value's type for messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
