//! Collection value documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{default_schema_version, SchemaMetadata};
use crate::error::Error;
use crate::path::CatalogPath;
use crate::value::OptionalValue;

/// Concrete values bound to a collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionValue {
    /// Schema format version.
    #[serde(default = "default_schema_version")]
    pub version: String,
    /// Identifying metadata.
    pub metadata: SchemaMetadata,
    /// Binding and values.
    pub spec: ValueSpec,
}

/// The hashed part of a collection value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValueSpec {
    /// Full path of the bound collection schema. Fixed after creation.
    pub schema: CatalogPath,
    /// Slot values by slot name.
    #[serde(default)]
    pub values: BTreeMap<String, OptionalValue>,
}

impl ValueSpec {
    /// Spec bound to the collection at `schema`, without values.
    pub fn new(schema: CatalogPath) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
        }
    }

    /// Set one slot value.
    pub fn with_value(mut self, slot: impl Into<String>, value: Value) -> Self {
        self.values.insert(slot.into(), OptionalValue::from_json(&value));
        self
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
