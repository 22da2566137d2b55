//! Parameter schema documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{default_schema_version, SchemaMetadata};
use crate::datatype::{DataType, DataTypeRegistry, TypeKey, DEFAULT_TYPE_VERSION};
use crate::error::{Error, ValidationErrors};
use crate::value::OptionalValue;

pub(crate) fn default_type_version() -> String {
    DEFAULT_TYPE_VERSION.to_string()
}

/// A typed, validated leaf definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParameterSchema {
    /// Schema format version.
    #[serde(default = "default_schema_version")]
    pub version: String,
    /// Identifying metadata.
    pub metadata: SchemaMetadata,
    /// Type and constraints.
    pub spec: ParameterSpec,
}

/// The hashed part of a parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParameterSpec {
    /// Data type name, e.g. `Integer`.
    pub data_type: String,
    /// Data type version.
    #[serde(default = "default_type_version")]
    pub data_type_version: String,
    /// Type specific constraints.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub validation: Value,
    /// Optional default value.
    #[serde(default, skip_serializing_if = "OptionalValue::is_unset")]
    pub default: OptionalValue,
}

impl ParameterSpec {
    /// Spec for `data_type` at the default type version, without constraints.
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            data_type_version: default_type_version(),
            validation: Value::Null,
            default: OptionalValue::unset(),
        }
    }

    /// Set the constraints.
    pub fn with_validation(mut self, validation: Value) -> Self {
        self.validation = validation;
        self
    }

    /// Set the default.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = OptionalValue::from_json(&default);
        self
    }

    /// Registry key of the data type.
    pub fn type_key(&self) -> TypeKey {
        TypeKey::new(&self.data_type, &self.data_type_version)
    }

    /// Build the validator, reporting spec problems.
    pub fn build(&self, registry: &DataTypeRegistry) -> Result<Box<dyn DataType>, ValidationErrors> {
        registry.build(&self.type_key(), &self.validation, &self.default)
    }

    /// Decode a stored spec payload.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Encode for hashing and storage.
    pub fn to_value(&self) -> Result<Value, Error> {
        serde_json::to_value(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
