//! Collection value manager.

use tracing::debug;

use super::collection::CollectionManager;
use super::{exact_lookup, Commit, SaveResult};
use crate::config::SaveOptions;
use crate::datatype::DataTypeRegistry;
use crate::error::{Error, ValidationErrors};
use crate::object::{CatalogObject, ObjectKind};
use crate::path::{check_name, QualifiedPath};
use crate::schema::{check_version, CanonicalMetadata, ValueSpec};
use crate::storage::{CatalogStore, ScopeView};
use crate::value::OptionalValue;

/// Wraps one collection value.
pub struct ValueManager<'r> {
    registry: &'r DataTypeRegistry,
    metadata: CanonicalMetadata,
    version: String,
    spec: ValueSpec,
}

impl<'r> ValueManager<'r> {
    /// Manager for a value being saved.
    pub fn new(
        registry: &'r DataTypeRegistry,
        metadata: CanonicalMetadata,
        version: impl Into<String>,
        spec: ValueSpec,
    ) -> Self {
        Self {
            registry,
            metadata,
            version: version.into(),
            spec,
        }
    }

    /// Canonical metadata.
    pub fn metadata(&self) -> &CanonicalMetadata {
        &self.metadata
    }

    /// The spec, including any defaults filled in so far.
    pub fn spec(&self) -> &ValueSpec {
        &self.spec
    }

    /// Check version, binding and slot names.
    pub fn validate_structure(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        check_version(&self.version, &mut errors);
        if self.spec.schema.is_root() {
            errors.push("spec.schema", "must name a collection schema");
        }
        for slot in self.spec.values.keys() {
            if let Err(e) = check_name(slot) {
                errors.push(format!("spec.values.{}", slot), e);
            }
        }
        errors.into_result()
    }

    /// Find the bound collection schema: exact path in this value's
    /// namespace, then in the root namespace.
    pub fn resolve_schema(&self, view: &ScopeView) -> Result<(QualifiedPath, CollectionManager<'r>), Error> {
        let (target, entry) = exact_lookup(&view.collections, &self.metadata.namespace, &self.spec.schema)?
            .ok_or_else(|| Error::not_found("collection schema", self.spec.schema.to_string()))?;
        let object = view.blobs.load(&entry.hash)?;
        let metadata = CanonicalMetadata::from_qualified(
            &self.metadata.catalog,
            &self.metadata.variant,
            &target,
            &object.description,
        )
        .ok_or_else(|| Error::Deserialization(format!("invalid collection path {}", target)))?;
        let manager = CollectionManager::from_object(self.registry, metadata, &object)?;
        Ok((target, manager))
    }

    /// Resolve the schema, reject unknown slots, check values and fill
    /// unset slots with their effective defaults.
    ///
    /// Returns the bound collection's path.
    pub fn validate_dependencies(
        &mut self,
        view: &ScopeView,
        check_values: bool,
    ) -> Result<QualifiedPath, Error> {
        let (schema_path, collection) = self.resolve_schema(view)?;
        let resolved = collection.validate_dependencies(view, false)?;

        let mut errors = ValidationErrors::new();
        for slot in self.spec.values.keys() {
            if resolved.get(slot).is_none() {
                errors.push(
                    format!("spec.values.{}", slot),
                    format!("unknown slot for {}", schema_path),
                );
            }
        }
        errors.into_result()?;

        if check_values {
            let me = self.metadata.qualified();
            for (slot, value) in &self.spec.values {
                if let Some(v) = value.as_json() {
                    collection.validate_value(&resolved, &me, slot, &v)?;
                }
            }
        }

        let mut errors = ValidationErrors::new();
        let mut fills = Vec::new();
        for (slot, resolved_slot) in resolved.iter() {
            let unset = self.spec.values.get(slot).map_or(true, OptionalValue::is_unset);
            if !unset {
                continue;
            }
            match resolved_slot.effective_default() {
                Ok(default) => fills.push((slot.clone(), default)),
                Err(msg) => errors.push(format!("spec.values.{}", slot), msg),
            }
        }
        errors.into_result()?;

        for (slot, default) in fills {
            debug!(value = %self.metadata.qualified(), slot = %slot, "filled slot default");
            self.spec.values.insert(slot, OptionalValue::from_json(&default));
        }
        Ok(schema_path)
    }

    /// Build the stored object.
    pub fn to_object(&self) -> Result<CatalogObject, Error> {
        CatalogObject::new(
            ObjectKind::CollectionValue,
            self.version.clone(),
            &self.spec.to_value()?,
            self.metadata.description.clone(),
        )
    }

    /// Run the full save pipeline.
    ///
    /// The bound schema is fixed by the first save; later saves must resolve
    /// to the same collection.
    pub fn save(
        &mut self,
        store: &CatalogStore,
        view: &ScopeView,
        options: &SaveOptions,
    ) -> Result<SaveResult, Error> {
        let target = self.metadata.qualified();
        if options.validate_structure {
            self.validate_structure()?;
        }

        let schema_path = self.validate_dependencies(view, options.validate_dependencies)?;
        let existing = view.values.get(&target)?;

        let commit = Commit {
            kind: ObjectKind::CollectionValue,
            target,
            object: self.to_object()?,
            references: vec![schema_path],
            references_kind: Some(ObjectKind::CollectionSchema),
            immutable_references: true,
            expected_referrers: existing.map(|e| e.referrers).unwrap_or_default(),
        };
        commit.persist(store, &view.workspace, options)
    }
}
