//! Collection schema manager.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::exact_lookup;
use crate::datatype::{DataType, DataTypeRegistry};
use crate::error::{Error, ValidationErrors};
use crate::object::{CatalogObject, ObjectKind};
use crate::path::{check_name, QualifiedPath};
use crate::references::normalize;
use crate::schema::{
    check_version, CanonicalMetadata, CollectionSpec, ParameterSpec, ReferenceSlot, SchemaRef,
    SlotSpec, ValueSpec,
};
use crate::storage::{PathEntry, ScopeView};
use crate::value::OptionalValue;

/// A slot with its validator and, for reference slots, the resolved target.
#[derive(Debug)]
pub struct ResolvedSlot {
    /// Parameter schema the slot resolved to; `None` for inline slots.
    pub target: Option<QualifiedPath>,
    /// Validator for values of this slot.
    pub data_type: Box<dyn DataType>,
    /// The slot's own value (override or inline default).
    pub value: OptionalValue,
}

impl ResolvedSlot {
    /// Slot value if set, otherwise the type's default, checked against
    /// the slot's type.
    pub fn effective_default(&self) -> Result<Value, String> {
        let value = match self.value.as_json() {
            Some(v) => v,
            None => self.data_type.default_value()?,
        };
        self.data_type.validate_value(&value)?;
        Ok(value)
    }
}

/// Every slot of a collection, resolved.
#[derive(Debug, Default)]
pub struct ResolvedSlots {
    slots: BTreeMap<String, ResolvedSlot>,
}

impl ResolvedSlots {
    /// Look up one slot.
    pub fn get(&self, slot: &str) -> Option<&ResolvedSlot> {
        self.slots.get(slot)
    }

    /// Iterate slots in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedSlot)> {
        self.slots.iter()
    }

    /// Resolved parameter targets, sorted and duplicate free.
    pub fn references(&self) -> Vec<QualifiedPath> {
        normalize(self.slots.values().filter_map(|s| s.target.clone()).collect())
    }

}

/// Wraps one collection schema.
pub struct CollectionManager<'r> {
    registry: &'r DataTypeRegistry,
    metadata: CanonicalMetadata,
    version: String,
    spec: CollectionSpec,
}

impl<'r> CollectionManager<'r> {
    /// Manager for a schema being saved.
    pub fn new(
        registry: &'r DataTypeRegistry,
        metadata: CanonicalMetadata,
        version: impl Into<String>,
        spec: CollectionSpec,
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
        if object.kind != ObjectKind::CollectionSchema {
            return Err(Error::Deserialization(format!(
                "object {} is a {}, not a collection schema",
                object.hash,
                object.kind.label()
            )));
        }
        let spec = CollectionSpec::from_value(object.spec()?)?;
        Ok(Self::new(registry, metadata, object.version.clone(), spec))
    }

    /// Canonical metadata.
    pub fn metadata(&self) -> &CanonicalMetadata {
        &self.metadata
    }

    /// The spec.
    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    /// The own value of `slot`, if the slot exists.
    pub fn slot_value(&self, slot: &str) -> Option<&OptionalValue> {
        self.spec.parameters.get(slot).map(SlotSpec::value)
    }

    /// Check version, slot names, references and inline types.
    pub fn validate_structure(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        check_version(&self.version, &mut errors);

        for (name, slot) in &self.spec.parameters {
            let field = format!("spec.parameters.{}", name);
            if let Err(e) = check_name(name) {
                errors.push(field.clone(), e);
            }
            match slot {
                SlotSpec::Reference(reference) => {
                    if let Err(e) = reference.target() {
                        errors.push(format!("{}.schema", field), e);
                    }
                }
                SlotSpec::Inline(inline) => match inline.build(self.registry) {
                    Ok(data_type) => errors.extend_prefixed(&field, data_type.validate_spec()),
                    Err(build_errors) => errors.extend_prefixed(&field, build_errors),
                },
            }
        }
        errors.into_result()
    }

    /// Find the parameter schema a reference slot points at.
    ///
    /// Bare names are resolved closest-parent first from this collection's
    /// own full path, so schemas nested under the collection shadow those of
    /// its ancestors. Absolute paths are looked up exactly. Both fall back to
    /// the root namespace.
    pub fn resolve_reference(
        &self,
        view: &ScopeView,
        reference: &ReferenceSlot,
    ) -> Result<(QualifiedPath, PathEntry), Error> {
        let target = reference.target().map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.push("schema", e);
            Error::Validation(errors)
        })?;
        let found = match &target {
            SchemaRef::Name(name) => view.parameters.resolve(
                &self.metadata.namespace,
                &self.metadata.full_path(),
                name,
            )?,
            SchemaRef::Path(path) => exact_lookup(&view.parameters, &self.metadata.namespace, path)?,
        };
        found.ok_or_else(|| {
            Error::not_found(
                "parameter schema",
                format!("{} (referenced from {})", reference.schema, self.metadata.qualified()),
            )
        })
    }

    /// Resolved target of every reference slot.
    pub fn resolve_targets(&self, view: &ScopeView) -> Result<BTreeMap<String, QualifiedPath>, Error> {
        let mut out = BTreeMap::new();
        for (name, slot) in &self.spec.parameters {
            if let SlotSpec::Reference(reference) = slot {
                let (target, _) = self.resolve_reference(view, reference)?;
                out.insert(name.clone(), target);
            }
        }
        Ok(out)
    }

    fn resolve_slot(
        &self,
        view: &ScopeView,
        name: &str,
        slot: &SlotSpec,
        check_value: bool,
    ) -> Result<ResolvedSlot, Error> {
        let (target, data_type) = match slot {
            SlotSpec::Reference(reference) => {
                let (target, entry) = self.resolve_reference(view, reference)?;
                let object = view.blobs.load(&entry.hash)?;
                let spec = ParameterSpec::from_value(object.spec()?)?;
                let data_type = spec
                    .build(self.registry)
                    .map_err(|e| Error::dependency(&target, e.to_string()))?;
                debug!(
                    collection = %self.metadata.qualified(),
                    slot = name,
                    resolved = %target,
                    "resolved slot reference"
                );
                (Some(target), data_type)
            }
            SlotSpec::Inline(inline) => {
                let data_type = inline.build(self.registry).map_err(|errors| {
                    let mut prefixed = ValidationErrors::new();
                    prefixed.extend_prefixed(&format!("spec.parameters.{}", name), errors);
                    Error::Validation(prefixed)
                })?;
                (None, data_type)
            }
        };

        let value = slot.value().clone();
        if check_value {
            if let Some(v) = value.as_json() {
                data_type.validate_value(&v).map_err(|msg| {
                    Error::dependency(
                        self.metadata.qualified(),
                        format!("slot '{}': {}", name, msg),
                    )
                })?;
            }
        }
        Ok(ResolvedSlot {
            target,
            data_type,
            value,
        })
    }

    /// Resolve every slot; with `check_values`, validate each slot's own
    /// value against its resolved type. Fails fast.
    pub fn validate_dependencies(
        &self,
        view: &ScopeView,
        check_values: bool,
    ) -> Result<ResolvedSlots, Error> {
        let mut slots = BTreeMap::new();
        for (name, slot) in &self.spec.parameters {
            slots.insert(name.clone(), self.resolve_slot(view, name, slot, check_values)?);
        }
        Ok(ResolvedSlots { slots })
    }

    /// Check a value for `slot` against the already resolved slots, failing
    /// on behalf of `holder`. Unknown slots are structural errors.
    pub fn validate_value(
        &self,
        resolved: &ResolvedSlots,
        holder: &QualifiedPath,
        slot: &str,
        value: &Value,
    ) -> Result<(), Error> {
        let resolved_slot = resolved.get(slot).ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.push(
                format!("spec.values.{}", slot),
                format!("unknown slot for {}", self.metadata.qualified()),
            );
            Error::Validation(errors)
        })?;
        resolved_slot
            .data_type
            .validate_value(value)
            .map_err(|msg| Error::dependency(holder, format!("slot '{}': {}", slot, msg)))
    }

    /// Fill every unset slot value from its resolved type's default.
    ///
    /// Each fill is checked against the slot's type; nothing is filled when
    /// any slot lacks a valid default.
    pub fn set_default_values(&mut self, resolved: &ResolvedSlots) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        let mut fills = Vec::new();
        for (name, slot) in &self.spec.parameters {
            if slot.value().is_set() {
                continue;
            }
            let Some(r) = resolved.get(name) else { continue };
            match r.data_type.default_value().and_then(|d| {
                r.data_type.validate_value(&d)?;
                Ok(d)
            }) {
                Ok(default) => fills.push((name.clone(), default)),
                Err(msg) => errors.push(format!("spec.parameters.{}", name), msg),
            }
        }
        errors.into_result()?;

        for (name, default) in fills {
            if let Some(slot) = self.spec.parameters.get_mut(&name) {
                debug!(collection = %self.metadata.qualified(), slot = %name, "filled slot default");
                slot.set_value(OptionalValue::from_json(&default));
            }
        }
        Ok(())
    }

    /// Revalidate stored collection values bound to this schema.
    pub fn validate_dependents(
        &self,
        view: &ScopeView,
        referrers: &[QualifiedPath],
        resolved: &ResolvedSlots,
    ) -> Result<(), Error> {
        for value_path in referrers {
            let entry = view.values.load(value_path)?;
            let spec = ValueSpec::from_value(view.blobs.load(&entry.hash)?.spec()?)?;
            for (slot, value) in &spec.values {
                let Some(resolved_slot) = resolved.get(slot) else {
                    warn!(collection = %self.metadata.qualified(), value = %value_path, slot = %slot, "slot removed while in use");
                    return Err(Error::dependency(
                        value_path,
                        format!("slot '{}' would be removed from {}", slot, self.metadata.qualified()),
                    ));
                };
                if let Some(v) = value.as_json() {
                    resolved_slot.data_type.validate_value(&v).map_err(|msg| {
                        warn!(collection = %self.metadata.qualified(), value = %value_path, slot = %slot, "dependent value rejected");
                        Error::dependency(value_path, format!("slot '{}': {}", slot, msg))
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Whether two collections hash identically. Unless `exclude_metadata`
    /// is set, namespace and path must match too.
    pub fn compare(&self, other: &CollectionManager<'_>, exclude_metadata: bool) -> Result<bool, Error> {
        if !exclude_metadata && self.metadata.qualified() != other.metadata.qualified() {
            return Ok(false);
        }
        Ok(self.to_object()?.hash == other.to_object()?.hash)
    }

    /// Build the stored object.
    pub fn to_object(&self) -> Result<CatalogObject, Error> {
        CatalogObject::new(
            ObjectKind::CollectionSchema,
            self.version.clone(),
            &self.spec.to_value()?,
            self.metadata.description.clone(),
        )
    }
}
