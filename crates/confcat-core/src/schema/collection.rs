//! Collection schema documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parameter::default_type_version;
use super::{default_schema_version, SchemaMetadata};
use crate::datatype::{DataType, DataTypeRegistry, TypeKey};
use crate::error::{Error, ValidationErrors};
use crate::path::{check_name, CatalogPath};
use crate::value::OptionalValue;

/// A named grouping of parameter slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionSchema {
    /// Schema format version.
    #[serde(default = "default_schema_version")]
    pub version: String,
    /// Identifying metadata.
    pub metadata: SchemaMetadata,
    /// Slots.
    pub spec: CollectionSpec,
}

/// The hashed part of a collection schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionSpec {
    /// Slots by name.
    #[serde(default)]
    pub parameters: BTreeMap<String, SlotSpec>,
}

impl CollectionSpec {
    /// Add a slot.
    pub fn with_slot(mut self, name: impl Into<String>, slot: SlotSpec) -> Self {
        self.parameters.insert(name.into(), slot);
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

/// One slot: a reference to a parameter schema or an inline type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotSpec {
    /// Typed by a parameter schema found by name or path.
    Reference(ReferenceSlot),
    /// Typed in place.
    Inline(InlineSlot),
}

impl SlotSpec {
    /// Reference slot for `schema` without an override.
    pub fn reference(schema: impl Into<String>) -> Self {
        SlotSpec::Reference(ReferenceSlot {
            schema: schema.into(),
            value: OptionalValue::unset(),
        })
    }

    /// Reference slot for `schema` with an override value.
    pub fn reference_with_value(schema: impl Into<String>, value: Value) -> Self {
        SlotSpec::Reference(ReferenceSlot {
            schema: schema.into(),
            value: OptionalValue::from_json(&value),
        })
    }

    /// Inline slot of `data_type` at the default type version.
    pub fn inline(data_type: impl Into<String>, validation: Value) -> Self {
        SlotSpec::Inline(InlineSlot {
            data_type: data_type.into(),
            data_type_version: default_type_version(),
            validation,
            default: OptionalValue::unset(),
        })
    }

    /// The slot's own value: the override of a reference slot or the
    /// default of an inline slot.
    pub fn value(&self) -> &OptionalValue {
        match self {
            SlotSpec::Reference(r) => &r.value,
            SlotSpec::Inline(i) => &i.default,
        }
    }

    pub(crate) fn set_value(&mut self, value: OptionalValue) {
        match self {
            SlotSpec::Reference(r) => r.value = value,
            SlotSpec::Inline(i) => i.default = value,
        }
    }
}

/// A slot typed by a parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReferenceSlot {
    /// Bare schema name (closest-parent lookup) or absolute `/`-prefixed path.
    pub schema: String,
    /// Override value, checked against the referenced schema.
    #[serde(default, skip_serializing_if = "OptionalValue::is_unset")]
    pub value: OptionalValue,
}

impl ReferenceSlot {
    /// Parse the schema reference.
    pub fn target(&self) -> Result<SchemaRef, String> {
        SchemaRef::parse(&self.schema)
    }
}

/// A slot typed in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InlineSlot {
    /// Data type name.
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

impl InlineSlot {
    /// Build the validator.
    pub fn build(&self, registry: &DataTypeRegistry) -> Result<Box<dyn DataType>, ValidationErrors> {
        registry.build(
            &TypeKey::new(&self.data_type, &self.data_type_version),
            &self.validation,
            &self.default,
        )
    }
}

/// How a reference slot names its parameter schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaRef {
    /// Bare name, resolved by closest-parent lookup.
    Name(String),
    /// Full path, looked up exactly.
    Path(CatalogPath),
}

impl SchemaRef {
    /// Parse `name` or `/full/path`.
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.starts_with('/') {
            let path = CatalogPath::parse(s)?;
            if path.is_root() {
                return Err("schema path must name a schema".to_string());
            }
            Ok(SchemaRef::Path(path))
        } else {
            check_name(s)?;
            Ok(SchemaRef::Name(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untagged_slots() {
        let spec: CollectionSpec = serde_json::from_value(json!({
            "parameters": {
                "retries": {"schema": "retries", "value": 4},
                "timeout": {"schema": "/shared/timeout"},
                "enabled": {"dataType": "Boolean", "default": true}
            }
        }))
        .unwrap();

        assert!(matches!(&spec.parameters["retries"], SlotSpec::Reference(r) if r.value.is_valid()));
        assert!(matches!(&spec.parameters["timeout"], SlotSpec::Reference(r) if r.value.is_unset()));
        match &spec.parameters["enabled"] {
            SlotSpec::Inline(slot) => {
                assert_eq!(slot.data_type_version, "v1");
                assert_eq!(slot.default.get_as::<bool>().unwrap(), true);
            }
            other => panic!("expected inline slot, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_slot_rejected() {
        let res: Result<CollectionSpec, _> = serde_json::from_value(json!({
            "parameters": {"x": {"schema": "P", "dataType": "Integer"}}
        }));
        assert!(res.is_err());
    }

    #[test]
    fn test_schema_ref_parse() {
        assert_eq!(SchemaRef::parse("P").unwrap(), SchemaRef::Name("P".into()));
        assert_eq!(
            SchemaRef::parse("/a/P").unwrap(),
            SchemaRef::Path(CatalogPath::parse("/a/P").unwrap())
        );
        assert!(SchemaRef::parse("/").is_err());
        assert!(SchemaRef::parse("a/P").is_err());
    }

    #[test]
    fn test_spec_value_is_canonical_input() {
        let spec = CollectionSpec::default()
            .with_slot("b", SlotSpec::reference("P"))
            .with_slot("a", SlotSpec::inline("Integer", Value::Null));
        assert_eq!(
            spec.to_value().unwrap(),
            json!({"parameters": {
                "a": {"dataType": "Integer", "dataTypeVersion": "v1"},
                "b": {"schema": "P"}
            }})
        );
    }
}
