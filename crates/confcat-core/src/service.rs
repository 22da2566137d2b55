//! The catalog service: the operations exposed to callers.

use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::config::{EngineConfig, SaveOptions};
use crate::datatype::DataTypeRegistry;
use crate::error::Error;
use crate::manager::{
    remove_entry, CollectionManager, ParameterManager, SaveResult, SchemaManager, ValueManager,
};
use crate::object::{CatalogObject, ObjectKind};
use crate::path::{QualifiedPath, ROOT_NAMESPACE};
use crate::schema::{
    CanonicalMetadata, CollectionSchema, CollectionValue, ParameterSchema, SchemaMetadata,
};
use crate::scope::{ScopeRegistry, WorkspaceId};
use crate::storage::{CatalogStore, ScopeView, StorageConfig};

/// A stored object as seen through its path, or by hash alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedObject {
    /// Object kind.
    #[serde(serialize_with = "serialize_display")]
    pub kind: ObjectKind,
    /// Content hash.
    pub hash: String,
    /// Schema format version.
    pub version: String,
    /// Human description.
    pub description: String,
    /// Decoded spec.
    pub spec: Value,
    /// Where the object is bound, when loaded by path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Outgoing references of the path entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// Reverse references of the path entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub referrers: Vec<String>,
}

impl LoadedObject {
    fn from_object(object: CatalogObject) -> Result<Self, Error> {
        Ok(Self {
            spec: object.spec()?,
            kind: object.kind,
            hash: object.hash,
            version: object.version,
            description: object.description,
            path: None,
            references: Vec::new(),
            referrers: Vec::new(),
        })
    }
}

fn serialize_display<S: Serializer>(kind: &ObjectKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(kind)
}

/// Entry point for catalog operations.
///
/// Owns the store, the data type registry and the engine configuration.
/// Every operation resolves its workspace from the metadata's catalog and
/// variant.
pub struct CatalogService {
    store: CatalogStore,
    registry: DataTypeRegistry,
    config: EngineConfig,
}

impl CatalogService {
    /// Open the store and wire up the service.
    pub fn open(
        storage: StorageConfig,
        config: EngineConfig,
        registry: DataTypeRegistry,
    ) -> Result<Self, Error> {
        let store = CatalogStore::open(storage, &config.default_variant_name)?;
        Ok(Self {
            store,
            registry,
            config,
        })
    }

    /// A service over a temporary database with the built-in types.
    pub fn temporary() -> Result<Self, Error> {
        Self::open(
            StorageConfig::temporary(),
            EngineConfig::default(),
            DataTypeRegistry::with_builtins(),
        )
    }

    /// The scope registry.
    pub fn scopes(&self) -> &ScopeRegistry {
        self.store.scopes()
    }

    /// The underlying store.
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// The data type registry.
    pub fn registry(&self) -> &DataTypeRegistry {
        &self.registry
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn resolve(&self, metadata: &SchemaMetadata) -> Result<(CanonicalMetadata, ScopeView), Error> {
        let catalog = self.store.scopes().catalog(&metadata.catalog)?;
        let canonical = metadata.canonicalize(&self.config, &catalog)?;
        let workspace = self
            .store
            .scopes()
            .workspace_for(&canonical.catalog, Some(&canonical.variant))?;
        Ok((canonical, self.store.view(&workspace)))
    }

    /// Save a parameter schema, revalidating the collections that use it.
    #[instrument(skip_all, fields(catalog = %schema.metadata.catalog, name = %schema.metadata.name))]
    pub fn save_parameter_schema(
        &self,
        schema: ParameterSchema,
        options: &SaveOptions,
    ) -> Result<SaveResult, Error> {
        let (metadata, view) = self.resolve(&schema.metadata)?;
        let mut manager = SchemaManager::Parameter(ParameterManager::new(
            &self.registry,
            metadata,
            schema.version,
            schema.spec,
        ));
        manager.save(&self.store, &view, options)
    }

    /// Save a collection schema, resolving its references and moving
    /// reverse edges to the new targets.
    #[instrument(skip_all, fields(catalog = %schema.metadata.catalog, name = %schema.metadata.name))]
    pub fn save_collection_schema(
        &self,
        schema: CollectionSchema,
        options: &SaveOptions,
    ) -> Result<SaveResult, Error> {
        let (metadata, view) = self.resolve(&schema.metadata)?;
        let mut manager = SchemaManager::Collection(CollectionManager::new(
            &self.registry,
            metadata,
            schema.version,
            schema.spec,
        ));
        manager.save(&self.store, &view, options)
    }

    /// Save a collection value bound to a collection schema.
    #[instrument(skip_all, fields(catalog = %value.metadata.catalog, name = %value.metadata.name))]
    pub fn save_collection_value(
        &self,
        value: CollectionValue,
        options: &SaveOptions,
    ) -> Result<SaveResult, Error> {
        let (metadata, view) = self.resolve(&value.metadata)?;
        let mut manager = ValueManager::new(&self.registry, metadata, value.version, value.spec);
        manager.save(&self.store, &view, options)
    }

    /// Load the object of `kind` bound at the metadata's path.
    #[instrument(skip(self, metadata), fields(name = %metadata.name))]
    pub fn load_by_path(
        &self,
        kind: ObjectKind,
        metadata: &SchemaMetadata,
    ) -> Result<LoadedObject, Error> {
        let (metadata, view) = self.resolve(metadata)?;
        let target = metadata.qualified();
        let entry = view.directory(kind).load(&target)?;
        let object = view
            .blobs
            .load(&entry.hash)
            .map_err(|e| e.context(format!("loading {} {}", kind.label(), target)))?;

        let mut loaded = LoadedObject::from_object(object)?;
        loaded.path = Some(target.to_string());
        loaded.references = entry.references;
        loaded.referrers = entry.referrers;
        Ok(loaded)
    }

    /// Load an object by content hash.
    pub fn load_by_hash(&self, hash: &str) -> Result<LoadedObject, Error> {
        LoadedObject::from_object(self.store.blobs().load(hash)?)
    }

    /// Load the collection value bound at the metadata's path.
    pub fn get_collection_value(&self, metadata: &SchemaMetadata) -> Result<LoadedObject, Error> {
        self.load_by_path(ObjectKind::CollectionValue, metadata)
    }

    /// Delete a parameter schema no collection references.
    #[instrument(skip_all, fields(name = %metadata.name))]
    pub fn delete_parameter_schema(&self, metadata: &SchemaMetadata) -> Result<String, Error> {
        let (metadata, view) = self.resolve(metadata)?;
        let entry = remove_entry(
            &self.store,
            &view.workspace,
            ObjectKind::ParameterSchema,
            &metadata.qualified(),
            None,
        )
        .inspect_err(|e| warn!(error = %e, "parameter delete rejected"))?;
        Ok(entry.hash)
    }

    /// Delete a collection schema with no values bound and nothing nested
    /// under it.
    #[instrument(skip_all, fields(name = %metadata.name))]
    pub fn delete_collection_schema(&self, metadata: &SchemaMetadata) -> Result<String, Error> {
        let (metadata, view) = self.resolve(metadata)?;
        let target = metadata.qualified();

        // Objects in other namespaces sit under a root collection whenever
        // their own namespace has no collection at the same path.
        let mut children = Vec::new();
        for child in view
            .parameters
            .descendants(&target.path)?
            .into_iter()
            .chain(view.collections.descendants(&target.path)?)
        {
            let under_target = child.namespace == target.namespace
                || (target.namespace == ROOT_NAMESPACE
                    && !view
                        .collections
                        .exists(&QualifiedPath::new(child.namespace.clone(), target.path.clone()))?);
            if under_target {
                children.push(child);
            }
        }
        if !children.is_empty() {
            children.sort();
            warn!(path = %target, children = children.len(), "collection delete blocked by children");
            return Err(Error::DeletionConflict {
                path: target.to_string(),
                blockers: children.iter().map(|c| c.to_string()).collect(),
            });
        }

        let entry = remove_entry(
            &self.store,
            &view.workspace,
            ObjectKind::CollectionSchema,
            &target,
            Some(ObjectKind::ParameterSchema),
        )
        .inspect_err(|e| warn!(error = %e, "collection delete rejected"))?;
        Ok(entry.hash)
    }

    /// Delete a collection value.
    #[instrument(skip_all, fields(name = %metadata.name))]
    pub fn delete_collection_value(&self, metadata: &SchemaMetadata) -> Result<String, Error> {
        let (metadata, view) = self.resolve(metadata)?;
        let entry = remove_entry(
            &self.store,
            &view.workspace,
            ObjectKind::CollectionValue,
            &metadata.qualified(),
            Some(ObjectKind::CollectionSchema),
        )?;
        Ok(entry.hash)
    }

    /// Full paths of every `kind` object in a workspace namespace, sorted.
    pub fn list(
        &self,
        workspace: &WorkspaceId,
        kind: ObjectKind,
        namespace: Option<&str>,
    ) -> Result<Vec<QualifiedPath>, Error> {
        let workspace = self.store.scopes().workspace(workspace)?;
        self.store
            .directory(&workspace, kind)
            .list(namespace.unwrap_or(ROOT_NAMESPACE))
    }
}
