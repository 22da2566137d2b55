//! Schema documents: metadata plus a kind specific spec.
//!
//! Documents are what callers submit. Before use, their metadata is
//! canonicalized against the engine configuration and the owning catalog
//! into a [`CanonicalMetadata`], which fixes the variant, namespace and path.

mod collection;
mod instance;
mod parameter;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ValidationErrors;
use crate::path::{check_name, CatalogPath, QualifiedPath, ROOT_NAMESPACE};
use crate::scope::Catalog;

pub use collection::{CollectionSchema, CollectionSpec, InlineSlot, ReferenceSlot, SchemaRef, SlotSpec};
pub use instance::{CollectionValue, ValueSpec};
pub use parameter::{ParameterSchema, ParameterSpec};

/// The only supported schema format version.
pub const SCHEMA_VERSION: &str = "v1";

pub(crate) fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Report an unsupported schema format version.
pub(crate) fn check_version(version: &str, errors: &mut ValidationErrors) {
    if version != SCHEMA_VERSION {
        errors.push(
            "version",
            format!("unsupported schema version '{}', expected {}", version, SCHEMA_VERSION),
        );
    }
}

/// Identifying metadata as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SchemaMetadata {
    /// Object name; the last segment of its full path.
    pub name: String,
    /// Owning catalog.
    pub catalog: String,
    /// Variant; the catalog's default variant when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Namespace; the root namespace when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Parent path of the object; `/` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<CatalogPath>,
    /// Human description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl SchemaMetadata {
    /// Metadata for `name` under `path` in `catalog`.
    pub fn new(catalog: impl Into<String>, path: CatalogPath, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            catalog: catalog.into(),
            path: Some(path),
            ..Default::default()
        }
    }

    /// Set the variant.
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Fill in defaults and check names.
    ///
    /// Missing variant becomes the catalog's default variant, missing
    /// namespace becomes the root namespace, and with hierarchical paths
    /// disabled the parent path is forced to `/`.
    pub fn canonicalize(
        &self,
        config: &EngineConfig,
        catalog: &Catalog,
    ) -> Result<CanonicalMetadata, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = check_name(&self.name) {
            errors.push("metadata.name", e);
        }
        if self.catalog != catalog.name {
            errors.push(
                "metadata.catalog",
                format!("expected catalog '{}', got '{}'", catalog.name, self.catalog),
            );
        }
        let variant = match &self.variant {
            Some(v) => {
                if let Err(e) = check_name(v) {
                    errors.push("metadata.variant", e);
                }
                v.clone()
            }
            None => catalog.default_variant.clone(),
        };
        let namespace = match &self.namespace {
            Some(ns) => {
                if let Err(e) = check_name(ns) {
                    errors.push("metadata.namespace", e);
                }
                ns.clone()
            }
            None => ROOT_NAMESPACE.to_string(),
        };
        let path = if config.hierarchical_paths {
            self.path.clone().unwrap_or_default()
        } else {
            CatalogPath::root()
        };
        if path.depth() + 1 > config.max_path_depth {
            errors.push(
                "metadata.path",
                format!(
                    "path {} is deeper than the maximum of {} segments",
                    path, config.max_path_depth
                ),
            );
        }

        errors.finish()?;
        Ok(CanonicalMetadata {
            name: self.name.clone(),
            catalog: catalog.name.clone(),
            variant,
            namespace,
            path,
            description: self.description.clone(),
        })
    }
}

/// Metadata after canonicalization; every field is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMetadata {
    /// Object name.
    pub name: String,
    /// Owning catalog.
    pub catalog: String,
    /// Variant.
    pub variant: String,
    /// Namespace.
    pub namespace: String,
    /// Parent path.
    pub path: CatalogPath,
    /// Human description.
    pub description: String,
}

impl CanonicalMetadata {
    /// Rebuild metadata for an object stored at `target`.
    pub fn from_qualified(
        catalog: &str,
        variant: &str,
        target: &QualifiedPath,
        description: &str,
    ) -> Option<Self> {
        Some(Self {
            name: target.name()?.to_string(),
            catalog: catalog.to_string(),
            variant: variant.to_string(),
            namespace: target.namespace.clone(),
            path: target.path.parent()?,
            description: description.to_string(),
        })
    }

    /// Path including the object's own name.
    pub fn full_path(&self) -> CatalogPath {
        self.path.join(&self.name)
    }

    /// Namespace plus full path.
    pub fn qualified(&self) -> QualifiedPath {
        QualifiedPath::new(self.namespace.clone(), self.full_path())
    }
}
