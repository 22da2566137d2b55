//! The catalog store: one sled database holding blobs, entries and scopes.

use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Db, Transactional, Tree};

use super::blob::{put_in_tx, BlobStore, PutOutcome, OBJECT_TREE};
use super::directory::{Directory, TxDirectory, ENTRY_TREE};
use super::StorageConfig;
use crate::error::Error;
use crate::object::{CatalogObject, ObjectKind};
use crate::scope::{ScopeRegistry, Workspace};

/// Owner of the sled database and its trees.
pub struct CatalogStore {
    db: Db,
    objects: Tree,
    entries: Tree,
    scopes: ScopeRegistry,
}

impl CatalogStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StorageConfig, default_variant: &str) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let objects = db.open_tree(OBJECT_TREE)?;
        let entries = db.open_tree(ENTRY_TREE)?;
        let scopes = ScopeRegistry::open(&db, default_variant)?;

        Ok(Self {
            db,
            objects,
            entries,
            scopes,
        })
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// The scope registry.
    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    /// The blob store.
    pub fn blobs(&self) -> BlobStore {
        BlobStore::new(self.objects.clone())
    }

    /// Non-transactional view of one workspace.
    pub fn view(&self, workspace: &Workspace) -> ScopeView {
        ScopeView {
            blobs: self.blobs(),
            parameters: self.directory(workspace, ObjectKind::ParameterSchema),
            collections: self.directory(workspace, ObjectKind::CollectionSchema),
            values: self.directory(workspace, ObjectKind::CollectionValue),
            workspace: workspace.clone(),
        }
    }

    /// Directory of `kind` objects in a workspace.
    pub fn directory(&self, workspace: &Workspace, kind: ObjectKind) -> Directory {
        Directory::new(self.entries.clone(), workspace.directory(kind), kind)
    }

    /// Run `f` in one serializable transaction over blobs and entries.
    ///
    /// The closure may run more than once when sled detects a conflict.
    pub(crate) fn transact<T, F>(&self, workspace: &Workspace, f: F) -> Result<T, Error>
    where
        F: Fn(&TxScope<'_>) -> Result<T, ConflictableTransactionError<Error>>,
    {
        let result: Result<T, TransactionError<Error>> =
            (&self.objects, &self.entries).transaction(|(objects, entries)| {
                let scope = TxScope::new(objects, entries, workspace);
                f(&scope)
            });
        result.map_err(Error::from)
    }
}

/// Read access to one workspace outside of a transaction.
#[derive(Clone)]
pub struct ScopeView {
    /// Shared blob store.
    pub blobs: BlobStore,
    /// Parameter schemas.
    pub parameters: Directory,
    /// Collection schemas.
    pub collections: Directory,
    /// Collection values.
    pub values: Directory,
    /// The workspace record.
    pub workspace: Workspace,
}

impl ScopeView {
    /// Directory holding `kind` objects.
    pub fn directory(&self, kind: ObjectKind) -> &Directory {
        match kind {
            ObjectKind::ParameterSchema => &self.parameters,
            ObjectKind::CollectionSchema => &self.collections,
            ObjectKind::CollectionValue => &self.values,
        }
    }
}

/// Transactional access to one workspace.
pub(crate) struct TxScope<'t> {
    objects: &'t TransactionalTree,
    parameters: TxDirectory<'t>,
    collections: TxDirectory<'t>,
    values: TxDirectory<'t>,
}

impl<'t> TxScope<'t> {
    fn new(
        objects: &'t TransactionalTree,
        entries: &'t TransactionalTree,
        workspace: &Workspace,
    ) -> Self {
        let dir = |kind| TxDirectory::new(entries, workspace.directory(kind), kind);
        Self {
            objects,
            parameters: dir(ObjectKind::ParameterSchema),
            collections: dir(ObjectKind::CollectionSchema),
            values: dir(ObjectKind::CollectionValue),
        }
    }

    pub(crate) fn directory(&self, kind: ObjectKind) -> &TxDirectory<'t> {
        match kind {
            ObjectKind::ParameterSchema => &self.parameters,
            ObjectKind::CollectionSchema => &self.collections,
            ObjectKind::CollectionValue => &self.values,
        }
    }

    pub(crate) fn put_object(
        &self,
        object: &CatalogObject,
    ) -> Result<PutOutcome, ConflictableTransactionError<Error>> {
        put_in_tx(self.objects, object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{CatalogPath, QualifiedPath, ROOT_NAMESPACE};
    use crate::storage::PathEntry;
    use serde_json::json;

    fn store_with_workspace() -> (CatalogStore, Workspace) {
        let store = CatalogStore::open(StorageConfig::temporary(), "default").unwrap();
        store.scopes().create_catalog("acme", "").unwrap();
        let ws = store.scopes().create_workspace("acme", None).unwrap();
        (store, ws)
    }

    #[test]
    fn test_transaction_commits_blob_and_entry() {
        let (store, ws) = store_with_workspace();
        let object =
            CatalogObject::new(ObjectKind::ParameterSchema, "v1", &json!({"x": 1}), "").unwrap();
        let target = QualifiedPath::new(ROOT_NAMESPACE, CatalogPath::parse("/P").unwrap());

        let outcome = store
            .transact(&ws, |tx| {
                let outcome = tx.put_object(&object)?;
                tx.directory(ObjectKind::ParameterSchema)
                    .upsert(&target, &PathEntry::new(object.hash.clone()))?;
                Ok(outcome)
            })
            .unwrap();
        assert_eq!(outcome, PutOutcome::Created);

        let view = store.view(&ws);
        assert_eq!(view.parameters.load(&target).unwrap().hash, object.hash);
        assert!(view.blobs.contains(&object.hash).unwrap());
        assert!(view.collections.get(&target).unwrap().is_none());
    }

    #[test]
    fn test_aborted_transaction_leaves_nothing() {
        let (store, ws) = store_with_workspace();
        let object =
            CatalogObject::new(ObjectKind::ParameterSchema, "v1", &json!({"x": 2}), "").unwrap();

        let err = store
            .transact(&ws, |tx| {
                tx.put_object(&object)?;
                Err::<(), _>(ConflictableTransactionError::Abort(Error::Scope(
                    "stop".into(),
                )))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Scope(_)));
        assert!(store.blobs().is_empty());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let target = QualifiedPath::new(ROOT_NAMESPACE, CatalogPath::parse("/P").unwrap());
        let ws = {
            let store = CatalogStore::open(StorageConfig::new(dir.path()), "default").unwrap();
            store.scopes().create_catalog("acme", "").unwrap();
            let ws = store.scopes().create_workspace("acme", None).unwrap();
            store
                .view(&ws)
                .parameters
                .upsert(&target, &PathEntry::new("h"))
                .unwrap();
            store.flush().unwrap();
            ws
        };

        let store = CatalogStore::open(StorageConfig::new(dir.path()), "default").unwrap();
        let reloaded = store.scopes().workspace_for("acme", None).unwrap();
        assert_eq!(reloaded, ws);
        assert_eq!(store.view(&reloaded).parameters.load(&target).unwrap().hash, "h");
    }
}
