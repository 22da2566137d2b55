//! Schema managers: validation, resolution and persistence per object kind.
//!
//! A save runs through these stages:
//! `Parsed -> MetadataCanonicalized -> StructurallyValidated ->
//! DependenciesResolved -> Hashed -> {Unchanged | Persisted}`.
//! Any failure before `Persisted` leaves storage untouched.

mod collection;
mod parameter;
mod value;

use std::fmt;

use serde::Serialize;
use sled::transaction::ConflictableTransactionError;
use tracing::{debug, info};

use crate::config::SaveOptions;
use crate::error::Error;
use crate::object::{CatalogObject, ObjectKind};
use crate::path::{CatalogPath, QualifiedPath, ROOT_NAMESPACE};
use crate::references::ReferenceDelta;
use crate::schema::CanonicalMetadata;
use crate::storage::{CatalogStore, Directory, PathEntry, PutOutcome, ScopeView};
use crate::scope::Workspace;

pub use collection::{CollectionManager, ResolvedSlot, ResolvedSlots};
pub use parameter::ParameterManager;
pub use value::ValueManager;

/// Stage of a save, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    /// Document decoded.
    Parsed,
    /// Variant, namespace and path fixed.
    MetadataCanonicalized,
    /// Metadata and spec checked.
    StructurallyValidated,
    /// References resolved and dependents revalidated.
    DependenciesResolved,
    /// Content hash computed.
    Hashed,
    /// Nothing to write.
    Unchanged,
    /// Written.
    Persisted,
}

impl fmt::Display for SaveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SaveStage::Parsed => "parsed",
            SaveStage::MetadataCanonicalized => "metadata_canonicalized",
            SaveStage::StructurallyValidated => "structurally_validated",
            SaveStage::DependenciesResolved => "dependencies_resolved",
            SaveStage::Hashed => "hashed",
            SaveStage::Unchanged => "unchanged",
            SaveStage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// What a save did to the path entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveState {
    /// Same hash and references as before; nothing written.
    Unchanged,
    /// No entry existed at the path.
    Created,
    /// The entry was replaced.
    Updated,
}

/// Result of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    /// Where the object is bound.
    pub path: QualifiedPath,
    /// Content hash of the object.
    pub hash: String,
    /// Effect on the path entry.
    pub state: SaveState,
    /// Effect on the blob store.
    pub blob: PutOutcome,
    /// Resolved outgoing references.
    pub references: Vec<QualifiedPath>,
}

/// Manager of a schema, dispatched by kind.
pub enum SchemaManager<'r> {
    /// A parameter schema.
    Parameter(ParameterManager<'r>),
    /// A collection schema.
    Collection(CollectionManager<'r>),
}

impl<'r> SchemaManager<'r> {
    /// Kind of the managed schema.
    pub fn kind(&self) -> ObjectKind {
        match self {
            SchemaManager::Parameter(_) => ObjectKind::ParameterSchema,
            SchemaManager::Collection(_) => ObjectKind::CollectionSchema,
        }
    }

    /// Canonical metadata.
    pub fn metadata(&self) -> &CanonicalMetadata {
        match self {
            SchemaManager::Parameter(m) => m.metadata(),
            SchemaManager::Collection(m) => m.metadata(),
        }
    }

    /// Check the metadata version and spec, collecting every failure.
    pub fn validate_structure(&self) -> Result<(), Error> {
        match self {
            SchemaManager::Parameter(m) => m.validate_structure(),
            SchemaManager::Collection(m) => m.validate_structure(),
        }
    }

    /// Build the content-addressed object.
    pub fn to_object(&self) -> Result<CatalogObject, Error> {
        match self {
            SchemaManager::Parameter(m) => m.to_object(),
            SchemaManager::Collection(m) => m.to_object(),
        }
    }

    /// Run the full save pipeline.
    pub fn save(
        &mut self,
        store: &CatalogStore,
        view: &ScopeView,
        options: &SaveOptions,
    ) -> Result<SaveResult, Error> {
        let kind = self.kind();
        let target = self.metadata().qualified();
        trace_stage(&target, SaveStage::MetadataCanonicalized);

        if options.validate_structure {
            self.validate_structure()?;
            trace_stage(&target, SaveStage::StructurallyValidated);
        }
        check_parent(view, &target)?;

        let existing = view.directory(kind).get(&target)?;
        let referrers = match &existing {
            Some(entry) => entry.referrer_paths()?,
            None => Vec::new(),
        };

        let references = match self {
            SchemaManager::Parameter(m) => {
                if options.validate_dependencies {
                    m.validate_dependencies(view, &referrers)?;
                }
                Vec::new()
            }
            SchemaManager::Collection(m) => {
                let resolved = m.validate_dependencies(view, options.validate_dependencies)?;
                if options.set_defaults {
                    m.set_default_values(&resolved)?;
                }
                if options.validate_dependencies {
                    m.validate_dependents(view, &referrers, &resolved)?;
                }
                resolved.references()
            }
        };
        trace_stage(&target, SaveStage::DependenciesResolved);

        let object = self.to_object()?;
        trace_stage(&target, SaveStage::Hashed);

        let commit = Commit {
            kind,
            target,
            object,
            references,
            references_kind: match kind {
                ObjectKind::CollectionSchema => Some(ObjectKind::ParameterSchema),
                _ => None,
            },
            immutable_references: false,
            expected_referrers: existing.map(|e| e.referrers).unwrap_or_default(),
        };
        commit.persist(store, &view.workspace, options)
    }
}

fn trace_stage(target: &QualifiedPath, stage: SaveStage) {
    debug!(path = %target, stage = %stage, "save stage reached");
}

/// Require the collection that contains `target` to exist.
///
/// Objects directly under `/` have no parent collection. The parent is looked
/// up in the target's namespace, then in the root namespace.
pub(crate) fn check_parent(view: &ScopeView, target: &QualifiedPath) -> Result<(), Error> {
    let parent = match target.path.parent() {
        Some(parent) if !parent.is_root() => parent,
        _ => return Ok(()),
    };
    if exact_lookup(&view.collections, &target.namespace, &parent)?.is_some() {
        return Ok(());
    }
    Err(Error::dependency(
        target,
        format!("parent collection {} does not exist", parent),
    ))
}

/// Exact path lookup in `namespace`, then in the root namespace.
pub(crate) fn exact_lookup(
    directory: &Directory,
    namespace: &str,
    path: &CatalogPath,
) -> Result<Option<(QualifiedPath, PathEntry)>, Error> {
    let candidate = QualifiedPath::new(namespace, path.clone());
    if let Some(entry) = directory.get(&candidate)? {
        return Ok(Some((candidate, entry)));
    }
    if namespace != ROOT_NAMESPACE {
        let fallback = QualifiedPath::new(ROOT_NAMESPACE, path.clone());
        if let Some(entry) = directory.get(&fallback)? {
            return Ok(Some((fallback, entry)));
        }
    }
    Ok(None)
}

/// Everything one save writes, applied in a single transaction.
pub(crate) struct Commit {
    pub(crate) kind: ObjectKind,
    pub(crate) target: QualifiedPath,
    pub(crate) object: CatalogObject,
    /// Sorted, duplicate free.
    pub(crate) references: Vec<QualifiedPath>,
    /// Directory of the referenced objects.
    pub(crate) references_kind: Option<ObjectKind>,
    /// Reject a change of references once set.
    pub(crate) immutable_references: bool,
    /// Referrers seen while revalidating dependents.
    pub(crate) expected_referrers: Vec<String>,
}

impl Commit {
    pub(crate) fn persist(
        &self,
        store: &CatalogStore,
        workspace: &Workspace,
        options: &SaveOptions,
    ) -> Result<SaveResult, Error> {
        let abort = ConflictableTransactionError::<Error>::Abort;
        let references = PathEntry::new(self.object.hash.clone())
            .with_references(&self.references)
            .references;

        let (state, blob) = store.transact(workspace, |tx| {
            let directory = tx.directory(self.kind);
            let existing = directory.get(&self.target)?;

            let existing_refs = match &existing {
                Some(entry) => {
                    if options.error_if_exists {
                        return Err(abort(Error::AlreadyExists {
                            kind: self.kind.label(),
                            name: self.target.to_string(),
                        }));
                    }
                    if self.immutable_references
                        && !entry.references.is_empty()
                        && entry.references != references
                    {
                        return Err(abort(Error::Immutable {
                            path: self.target.to_string(),
                            existing: entry.references.join(", "),
                            requested: references.join(", "),
                        }));
                    }
                    if entry.referrers != self.expected_referrers {
                        return Err(abort(Error::dependency(
                            &self.target,
                            "dependents changed while the save was validated",
                        )));
                    }
                    if entry.hash == self.object.hash && entry.references == references {
                        if options.error_if_equal {
                            return Err(abort(Error::NoOp {
                                kind: self.kind.label(),
                                path: self.target.to_string(),
                            }));
                        }
                        return Ok((SaveState::Unchanged, PutOutcome::AlreadyExists));
                    }
                    entry.reference_paths().map_err(abort)?
                }
                None => Vec::new(),
            };

            let blob = tx.put_object(&self.object)?;
            if let Some(references_kind) = self.references_kind {
                ReferenceDelta::between(&existing_refs, &self.references)
                    .apply(tx.directory(references_kind), &self.target)?;
            }

            let referrers = existing
                .as_ref()
                .map(|e| e.referrers.clone())
                .unwrap_or_default();
            let entry = PathEntry {
                hash: self.object.hash.clone(),
                references: references.clone(),
                referrers,
            };
            directory.upsert(&self.target, &entry)?;

            let state = if existing.is_some() {
                SaveState::Updated
            } else {
                SaveState::Created
            };
            Ok((state, blob))
        })?;

        match state {
            SaveState::Unchanged => trace_stage(&self.target, SaveStage::Unchanged),
            _ => info!(
                kind = %self.kind,
                path = %self.target,
                hash = %self.object.hash,
                state = ?state,
                "saved object"
            ),
        }

        Ok(SaveResult {
            path: self.target.clone(),
            hash: self.object.hash.clone(),
            state,
            blob,
            references: self.references.clone(),
        })
    }
}

/// Remove the entry at `target` unless something still refers to it.
///
/// Reverse edges the entry held on its own targets (in `references_kind`)
/// are dropped in the same transaction.
pub(crate) fn remove_entry(
    store: &CatalogStore,
    workspace: &Workspace,
    kind: ObjectKind,
    target: &QualifiedPath,
    references_kind: Option<ObjectKind>,
) -> Result<PathEntry, Error> {
    let abort = ConflictableTransactionError::<Error>::Abort;
    let removed = store.transact(workspace, |tx| {
        let directory = tx.directory(kind);
        let entry = directory.load(target)?;
        if entry.is_referenced() {
            return Err(abort(Error::DeletionConflict {
                path: target.to_string(),
                blockers: entry.referrers.clone(),
            }));
        }
        if let Some(references_kind) = references_kind {
            let delta = ReferenceDelta {
                added: Vec::new(),
                removed: entry.reference_paths().map_err(abort)?,
            };
            delta.apply(tx.directory(references_kind), target)?;
        }
        directory.delete(target)?;
        Ok(entry)
    })?;

    info!(kind = %kind, path = %target, hash = %removed.hash, "deleted object");
    Ok(removed)
}
