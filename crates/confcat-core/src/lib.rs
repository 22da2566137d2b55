//! confcat core - content-addressed configuration schema catalog.
//!
//! Parameter schemas, collection schemas and collection values are stored as
//! immutable, hash-addressed objects and bound to hierarchical paths inside a
//! workspace. Collections reference parameters by closest-ancestor
//! resolution; the reference graph is kept bidirectional so deletes and
//! schema changes can be checked against their dependents.

pub mod config;
pub mod datatype;
pub mod error;
pub mod hashing;
pub mod manager;
pub mod object;
pub mod path;
pub mod references;
pub mod schema;
pub mod scope;
pub mod service;
pub mod storage;
pub mod value;

pub use config::{EngineConfig, SaveOptions};
pub use datatype::{DataType, DataTypeFactory, DataTypeRegistry, TypeKey};
pub use error::{Error, ErrorKind, FieldError, Result, ResultExt, ValidationErrors};
pub use manager::{SaveResult, SaveStage, SaveState};
pub use object::{CatalogObject, ObjectKind};
pub use path::{CatalogPath, QualifiedPath, ROOT_NAMESPACE};
pub use schema::{
    CollectionSchema, CollectionSpec, CollectionValue, ParameterSchema, ParameterSpec,
    SchemaMetadata, SlotSpec, ValueSpec, SCHEMA_VERSION,
};
pub use scope::{Catalog, ScopeRegistry, Variant, Workspace, WorkspaceId};
pub use service::{CatalogService, LoadedObject};
pub use storage::{CatalogStore, PutOutcome, StorageConfig};
pub use value::OptionalValue;
