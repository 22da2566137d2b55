//! Persistent registry of catalogs, variants and workspaces.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::{debug, info};

use super::{now_millis, Catalog, Variant, Workspace, WorkspaceId};
use crate::error::{Error, ResultExt};
use crate::path::check_name;

/// Tree name for catalogs (name -> catalog).
pub const CATALOG_TREE: &str = "scope:catalogs";

/// Tree name for variants (catalog + 0x00 + name -> variant).
pub const VARIANT_TREE: &str = "scope:variants";

/// Tree name for workspaces (id -> workspace).
pub const WORKSPACE_TREE: &str = "scope:workspaces";

/// Catalog, variant and workspace lookup and creation.
#[derive(Clone)]
pub struct ScopeRegistry {
    catalogs: Tree,
    variants: Tree,
    workspaces: Tree,
    default_variant: String,
}

impl ScopeRegistry {
    /// Open the registry trees in `db`.
    pub fn open(db: &Db, default_variant: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            catalogs: db.open_tree(CATALOG_TREE)?,
            variants: db.open_tree(VARIANT_TREE)?,
            workspaces: db.open_tree(WORKSPACE_TREE)?,
            default_variant: default_variant.into(),
        })
    }

    /// Create a catalog together with its default variant.
    pub fn create_catalog(&self, name: &str, description: &str) -> Result<Catalog, Error> {
        check_scope_name("catalog", name)?;
        let catalog = Catalog {
            name: name.to_string(),
            description: description.to_string(),
            default_variant: self.default_variant.clone(),
            created_at: now_millis(),
        };
        let variant = Variant {
            catalog: name.to_string(),
            name: self.default_variant.clone(),
            workspace: None,
        };
        let catalog_bytes = catalog.to_bytes()?;
        let variant_bytes = variant.to_bytes()?;
        let variant_key = variant_key(name, &variant.name);

        let result: Result<(), TransactionError<Error>> = (&self.catalogs, &self.variants)
            .transaction(|(catalogs, variants)| {
                if catalogs.get(name.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(Error::AlreadyExists {
                        kind: "catalog",
                        name: name.to_string(),
                    }));
                }
                catalogs.insert(name.as_bytes(), catalog_bytes.clone())?;
                variants.insert(variant_key.clone(), variant_bytes.clone())?;
                Ok(())
            });
        result?;

        info!(catalog = name, variant = %catalog.default_variant, "created catalog");
        Ok(catalog)
    }

    /// Create an additional variant of an existing catalog.
    pub fn create_variant(&self, catalog: &str, name: &str) -> Result<Variant, Error> {
        check_scope_name("variant", name)?;
        self.catalog(catalog)?;

        let variant = Variant {
            catalog: catalog.to_string(),
            name: name.to_string(),
            workspace: None,
        };
        let swapped = self
            .variants
            .compare_and_swap(
                variant_key(catalog, name),
                None as Option<&[u8]>,
                Some(variant.to_bytes()?),
            )
            .with_context(|| format!("creating variant {}/{}", catalog, name))?;
        if swapped.is_err() {
            return Err(Error::AlreadyExists {
                kind: "variant",
                name: format!("{}/{}", catalog, name),
            });
        }

        info!(catalog, variant = name, "created variant");
        Ok(variant)
    }

    /// Create the workspace of a catalog/variant, allocating its directories.
    ///
    /// `variant` defaults to the catalog's default variant. A variant owns at
    /// most one workspace.
    pub fn create_workspace(&self, catalog: &str, variant: Option<&str>) -> Result<Workspace, Error> {
        let catalog_record = self.catalog(catalog)?;
        let variant_name = variant.unwrap_or(catalog_record.default_variant.as_str());
        let key = variant_key(catalog, variant_name);
        let workspace = Workspace::new(catalog, variant_name);
        let workspace_bytes = workspace.to_bytes()?;

        let result: Result<(), TransactionError<Error>> = (&self.variants, &self.workspaces)
            .transaction(|(variants, workspaces)| {
                let bytes = variants.get(&key)?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(unknown_variant(catalog, variant_name))
                })?;
                let mut record =
                    Variant::from_bytes(&bytes).map_err(ConflictableTransactionError::Abort)?;
                if record.workspace.is_some() {
                    return Err(ConflictableTransactionError::Abort(Error::AlreadyExists {
                        kind: "workspace",
                        name: format!("{}/{}", catalog, variant_name),
                    }));
                }
                record.workspace = Some(workspace.id);
                let record_bytes = record.to_bytes().map_err(ConflictableTransactionError::Abort)?;
                variants.insert(key.as_slice(), record_bytes)?;
                workspaces.insert(&workspace.id[..], workspace_bytes.clone())?;
                Ok(())
            });
        result?;

        info!(
            catalog,
            variant = variant_name,
            workspace = %workspace.workspace_id(),
            "created workspace"
        );
        Ok(workspace)
    }

    /// Look up a catalog by name.
    pub fn catalog(&self, name: &str) -> Result<Catalog, Error> {
        match self
            .catalogs
            .get(name.as_bytes())
            .with_context(|| format!("reading catalog {}", name))?
        {
            Some(bytes) => Catalog::from_bytes(&bytes),
            None => Err(Error::Scope(format!("unknown catalog '{}'", name))),
        }
    }

    /// Look up a variant of a catalog.
    pub fn variant(&self, catalog: &str, name: &str) -> Result<Variant, Error> {
        self.catalog(catalog)?;
        match self
            .variants
            .get(variant_key(catalog, name))
            .with_context(|| format!("reading variant {}/{}", catalog, name))?
        {
            Some(bytes) => Variant::from_bytes(&bytes),
            None => Err(unknown_variant(catalog, name)),
        }
    }

    /// Look up a workspace by id.
    pub fn workspace(&self, id: &WorkspaceId) -> Result<Workspace, Error> {
        match self
            .workspaces
            .get(id.0)
            .with_context(|| format!("reading workspace {}", id))?
        {
            Some(bytes) => Workspace::from_bytes(&bytes),
            None => Err(Error::Scope(format!("unknown workspace '{}'", id))),
        }
    }

    /// Resolve the workspace of a catalog/variant.
    ///
    /// `variant` defaults to the catalog's default variant.
    pub fn workspace_for(&self, catalog: &str, variant: Option<&str>) -> Result<Workspace, Error> {
        let catalog_record = self.catalog(catalog)?;
        let variant_name = variant.unwrap_or(catalog_record.default_variant.as_str());
        let record = self.variant(catalog, variant_name)?;
        let id = record.workspace_id().ok_or_else(|| {
            Error::Scope(format!("variant '{}/{}' has no workspace", catalog, variant_name))
        })?;
        debug!(catalog, variant = variant_name, workspace = %id, "resolved workspace");
        self.workspace(&id)
    }

    /// All catalogs, sorted by name.
    pub fn list_catalogs(&self) -> Result<Vec<Catalog>, Error> {
        let mut out = Vec::new();
        for result in self.catalogs.iter() {
            let (_, bytes) = result.with_context(|| "scanning catalogs")?;
            out.push(Catalog::from_bytes(&bytes)?);
        }
        Ok(out)
    }

    /// All variants of a catalog, sorted by name.
    pub fn list_variants(&self, catalog: &str) -> Result<Vec<Variant>, Error> {
        self.catalog(catalog)?;
        let mut prefix = catalog.as_bytes().to_vec();
        prefix.push(0);
        let mut out = Vec::new();
        for result in self.variants.scan_prefix(prefix) {
            let (_, bytes) = result.with_context(|| format!("scanning variants of {}", catalog))?;
            out.push(Variant::from_bytes(&bytes)?);
        }
        Ok(out)
    }
}

fn variant_key(catalog: &str, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(catalog.len() + name.len() + 1);
    key.extend_from_slice(catalog.as_bytes());
    key.push(0);
    key.extend_from_slice(name.as_bytes());
    key
}

fn unknown_variant(catalog: &str, name: &str) -> Error {
    Error::Scope(format!("unknown variant '{}/{}'", catalog, name))
}

fn check_scope_name(kind: &str, name: &str) -> Result<(), Error> {
    check_name(name).map_err(|e| Error::Scope(format!("invalid {} name: {}", kind, e)))
}
