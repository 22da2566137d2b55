//! Parameter schema manager.

use serde_json::Value;
use tracing::{debug, warn};

use super::collection::CollectionManager;
use crate::datatype::{DataType, DataTypeRegistry};
use crate::error::{Error, ValidationErrors};
use crate::object::{CatalogObject, ObjectKind};
use crate::path::QualifiedPath;
use crate::schema::{check_version, CanonicalMetadata, ParameterSpec, ValueSpec};
use crate::storage::ScopeView;

/// Wraps one parameter schema and delegates typing to the registry.
pub struct ParameterManager<'r> {
    registry: &'r DataTypeRegistry,
    metadata: CanonicalMetadata,
    version: String,
    spec: ParameterSpec,
}

impl<'r> ParameterManager<'r> {
    /// Manager for a schema being saved.
    pub fn new(
        registry: &'r DataTypeRegistry,
        metadata: CanonicalMetadata,
        version: impl Into<String>,
        spec: ParameterSpec,
    ) -> Self {
        Self {
            registry,
            metadata,
            version: version.into(),
            spec,
        }
    }

    /// Manager for a stored schema.
    pub fn from_object(
        registry: &'r DataTypeRegistry,
        metadata: CanonicalMetadata,
        object: &CatalogObject,
    ) -> Result<Self, Error> {
        if object.kind != ObjectKind::ParameterSchema {
            return Err(Error::Deserialization(format!(
                "object {} is a {}, not a parameter schema",
                object.hash,
                object.kind.label()
            )));
        }
        let spec = ParameterSpec::from_value(object.spec()?)?;
        Ok(Self::new(registry, metadata, object.version.clone(), spec))
    }

    /// Canonical metadata.
    pub fn metadata(&self) -> &CanonicalMetadata {
        &self.metadata
    }

    /// The spec.
    pub fn spec(&self) -> &ParameterSpec {
        &self.spec
    }

    /// Build the validator for this schema.
    pub fn data_type(&self) -> Result<Box<dyn DataType>, Error> {
        self.spec.build(self.registry).map_err(|errors| {
            let mut prefixed = ValidationErrors::new();
            prefixed.extend_prefixed("spec", errors);
            Error::Validation(prefixed)
        })
    }

    /// Check version, type and constraints.
    pub fn validate_structure(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        check_version(&self.version, &mut errors);
        match self.spec.build(self.registry) {
            Ok(data_type) => errors.extend_prefixed("spec", data_type.validate_spec()),
            Err(build_errors) => errors.extend_prefixed("spec", build_errors),
        }
        errors.into_result()
    }

    /// Check a value against this schema.
    pub fn validate_value(&self, value: &Value) -> Result<(), Error> {
        self.data_type()?
            .validate_value(value)
            .map_err(|msg| Error::dependency(self.metadata.qualified(), msg))
    }

    /// The schema's effective default.
    pub fn default_value(&self) -> Result<Value, Error> {
        self.data_type()?.default_value().map_err(|msg| {
            let mut errors = ValidationErrors::new();
            errors.push("spec.default", msg);
            Error::Validation(errors)
        })
    }

    /// Build the stored object.
    pub fn to_object(&self) -> Result<CatalogObject, Error> {
        CatalogObject::new(
            ObjectKind::ParameterSchema,
            self.version.clone(),
            &self.spec.to_value()?,
            self.metadata.description.clone(),
        )
    }

    /// Revalidate every dependent value against this (possibly changed) schema.
    ///
    /// `referrers` are the collections referencing this parameter. Each one is
    /// re-resolved; slots that still resolve here have their override checked,
    /// as do the values stored for those slots in the collection's values.
    pub fn validate_dependencies(
        &self,
        view: &ScopeView,
        referrers: &[QualifiedPath],
    ) -> Result<(), Error> {
        if referrers.is_empty() {
            return Ok(());
        }
        let data_type = self.data_type()?;
        let me = self.metadata.qualified();

        for collection_path in referrers {
            let entry = view.collections.load(collection_path)?;
            let object = view.blobs.load(&entry.hash)?;
            let metadata = CanonicalMetadata::from_qualified(
                &self.metadata.catalog,
                &self.metadata.variant,
                collection_path,
                &object.description,
            )
            .ok_or_else(|| Error::Deserialization(format!("invalid referrer {}", collection_path)))?;
            let collection = CollectionManager::from_object(self.registry, metadata, &object)?;

            let slots: Vec<String> = collection
                .resolve_targets(view)?
                .into_iter()
                .filter(|(_, target)| *target == me)
                .map(|(slot, _)| slot)
                .collect();
            debug!(
                parameter = %me,
                collection = %collection_path,
                slots = slots.len(),
                "revalidating dependent collection"
            );

            for slot in &slots {
                if let Some(value) = collection.slot_value(slot).and_then(|v| v.as_json()) {
                    check_dependent(&*data_type, collection_path, slot, &value, &me)?;
                }
            }

            for value_path in entry.referrer_paths()? {
                let value_entry = view.values.load(&value_path)?;
                let spec = ValueSpec::from_value(view.blobs.load(&value_entry.hash)?.spec()?)?;
                for slot in &slots {
                    if let Some(value) = spec.values.get(slot).and_then(|v| v.as_json()) {
                        check_dependent(&*data_type, &value_path, slot, &value, &me)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_dependent(
    data_type: &dyn DataType,
    holder: &QualifiedPath,
    slot: &str,
    value: &Value,
    parameter: &QualifiedPath,
) -> Result<(), Error> {
    data_type.validate_value(value).map_err(|msg| {
        warn!(parameter = %parameter, dependent = %holder, slot, "dependent value rejected");
        Error::dependency(
            holder,
            format!("slot '{}' is no longer valid for {}: {}", slot, parameter, msg),
        )
    })
}
