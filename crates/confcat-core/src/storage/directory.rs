//! Path index: per-directory mapping from qualified paths to entries.
//!
//! Every directory shares the `catalog:entries` tree; keys are prefixed with
//! the directory id (see [`super::key`]).

use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::Tree;
use tracing::debug;

use super::entry::PathEntry;
use super::key::{children_prefix, decode_entry_key, entry_key, namespace_prefix, DirectoryId};
use crate::error::{Error, ResultExt};
use crate::object::ObjectKind;
use crate::path::{CatalogPath, QualifiedPath, ROOT_NAMESPACE};

/// Tree name for directory entries.
pub const ENTRY_TREE: &str = "catalog:entries";

/// Read/write access to one directory outside of a transaction.
#[derive(Clone)]
pub struct Directory {
    tree: Tree,
    id: DirectoryId,
    kind: ObjectKind,
}

impl Directory {
    /// Open a directory view over the entry tree.
    pub fn new(tree: Tree, id: DirectoryId, kind: ObjectKind) -> Self {
        Self { tree, id, kind }
    }

    /// The directory id.
    pub fn id(&self) -> DirectoryId {
        self.id
    }

    /// Kind of objects held by this directory.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn context(&self, op: &str, target: &QualifiedPath) -> String {
        format!("{} {} directory entry {}", op, self.kind.label(), target)
    }

    /// Get the entry at `target`.
    pub fn get(&self, target: &QualifiedPath) -> Result<Option<PathEntry>, Error> {
        let key = entry_key(&self.id, target);
        match self.tree.get(key).with_context(|| self.context("reading", target))? {
            Some(bytes) => Ok(Some(
                PathEntry::from_bytes(&bytes).with_context(|| self.context("decoding", target))?,
            )),
            None => Ok(None),
        }
    }

    /// Get the entry at `target`, failing if absent.
    pub fn load(&self, target: &QualifiedPath) -> Result<PathEntry, Error> {
        self.get(target)?
            .ok_or_else(|| Error::not_found(self.kind.label(), target.to_string()))
    }

    /// Replace the entry at `target`.
    pub fn upsert(&self, target: &QualifiedPath, entry: &PathEntry) -> Result<(), Error> {
        let bytes = entry.to_bytes()?;
        self.tree
            .insert(entry_key(&self.id, target), bytes)
            .with_context(|| self.context("writing", target))?;
        Ok(())
    }

    /// Remove the entry at `target`.
    pub fn delete(&self, target: &QualifiedPath) -> Result<(), Error> {
        match self
            .tree
            .remove(entry_key(&self.id, target))
            .with_context(|| self.context("removing", target))?
        {
            Some(_) => Ok(()),
            None => Err(Error::not_found(self.kind.label(), target.to_string())),
        }
    }

    /// Whether an entry exists at `target`.
    pub fn exists(&self, target: &QualifiedPath) -> Result<bool, Error> {
        self.tree
            .contains_key(entry_key(&self.id, target))
            .with_context(|| self.context("reading", target))
    }

    /// Find `name` at `start` or the nearest ancestor of `start`.
    ///
    /// Checks `start/name`, then each shorter prefix, ending with `/name`.
    /// The first hit wins, so deeper definitions shadow shallower ones.
    pub fn find_closest_ancestor(
        &self,
        namespace: &str,
        start: &CatalogPath,
        name: &str,
    ) -> Result<Option<(QualifiedPath, PathEntry)>, Error> {
        for scope in start.ancestors() {
            let candidate = QualifiedPath::new(namespace, scope.join(name));
            if let Some(entry) = self.get(&candidate)? {
                debug!(name, start = %start, resolved = %candidate, "resolved closest ancestor");
                return Ok(Some((candidate, entry)));
            }
        }
        Ok(None)
    }

    /// Closest-ancestor lookup in `namespace`, falling back to the root
    /// namespace when nothing matches.
    pub fn resolve(
        &self,
        namespace: &str,
        start: &CatalogPath,
        name: &str,
    ) -> Result<Option<(QualifiedPath, PathEntry)>, Error> {
        if let Some(found) = self.find_closest_ancestor(namespace, start, name)? {
            return Ok(Some(found));
        }
        if namespace != ROOT_NAMESPACE {
            debug!(name, namespace, "falling back to root namespace");
            return self.find_closest_ancestor(ROOT_NAMESPACE, start, name);
        }
        Ok(None)
    }

    /// Add an outgoing edge on the entry at `target`.
    pub fn add_reference(&self, target: &QualifiedPath, edge: &QualifiedPath) -> Result<(), Error> {
        self.update(target, |entry| {
            entry.add_reference(edge);
            Ok(())
        })
    }

    /// Remove an outgoing edge from the entry at `target`. An absent edge is
    /// a dependency error.
    pub fn remove_reference(
        &self,
        target: &QualifiedPath,
        edge: &QualifiedPath,
    ) -> Result<(), Error> {
        self.update(target, |entry| {
            if entry.remove_reference(edge) {
                Ok(())
            } else {
                Err(missing_edge(target, edge))
            }
        })
    }

    /// Outgoing edges of the entry at `target`.
    pub fn references(&self, target: &QualifiedPath) -> Result<Vec<QualifiedPath>, Error> {
        self.load(target)?.reference_paths()
    }

    /// Reverse edges of the entry at `target`.
    pub fn referrers(&self, target: &QualifiedPath) -> Result<Vec<QualifiedPath>, Error> {
        self.load(target)?.referrer_paths()
    }

    /// Atomically read-modify-write the entry at `target`.
    fn update<F>(&self, target: &QualifiedPath, f: F) -> Result<(), Error>
    where
        F: Fn(&mut PathEntry) -> Result<(), Error>,
    {
        let key = entry_key(&self.id, target);
        let result: Result<(), sled::transaction::TransactionError<Error>> =
            self.tree.transaction(|tx| {
                let mut entry = get_in_tx(tx, &key, self.kind, target)?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(Error::not_found(
                        self.kind.label(),
                        target.to_string(),
                    ))
                })?;
                f(&mut entry).map_err(ConflictableTransactionError::Abort)?;
                upsert_in_tx(tx, &key, &entry)?;
                Ok(())
            });
        result.map_err(Error::from)
    }

    /// All paths in `namespace`, sorted.
    pub fn list(&self, namespace: &str) -> Result<Vec<QualifiedPath>, Error> {
        self.scan(namespace_prefix(&self.id, namespace))
    }

    /// Paths strictly below `parent`, sorted.
    pub fn children(&self, namespace: &str, parent: &CatalogPath) -> Result<Vec<QualifiedPath>, Error> {
        self.scan(children_prefix(&self.id, namespace, parent))
    }

    /// Paths strictly below `parent` in every namespace, sorted.
    pub fn descendants(&self, parent: &CatalogPath) -> Result<Vec<QualifiedPath>, Error> {
        let mut out = self.scan(self.id.as_bytes().to_vec())?;
        out.retain(|q| parent.is_ancestor_of(&q.path));
        out.sort();
        Ok(out)
    }

    fn scan(&self, prefix: Vec<u8>) -> Result<Vec<QualifiedPath>, Error> {
        let mut out = Vec::new();
        for result in self.tree.scan_prefix(&prefix) {
            let (key, _) = result.with_context(|| format!("scanning {} directory", self.kind.label()))?;
            let path = decode_entry_key(&key).ok_or_else(|| {
                Error::Deserialization(format!("invalid {} entry key", self.kind.label()))
            })?;
            out.push(path);
        }
        Ok(out)
    }
}

/// Directory access inside a multi-tree transaction.
pub(crate) struct TxDirectory<'t> {
    tree: &'t TransactionalTree,
    id: DirectoryId,
    kind: ObjectKind,
}

impl<'t> TxDirectory<'t> {
    pub(crate) fn new(tree: &'t TransactionalTree, id: DirectoryId, kind: ObjectKind) -> Self {
        Self { tree, id, kind }
    }

    pub(crate) fn get(
        &self,
        target: &QualifiedPath,
    ) -> Result<Option<PathEntry>, ConflictableTransactionError<Error>> {
        get_in_tx(self.tree, &entry_key(&self.id, target), self.kind, target)
    }

    pub(crate) fn load(
        &self,
        target: &QualifiedPath,
    ) -> Result<PathEntry, ConflictableTransactionError<Error>> {
        self.get(target)?.ok_or_else(|| {
            ConflictableTransactionError::Abort(Error::not_found(
                self.kind.label(),
                target.to_string(),
            ))
        })
    }

    pub(crate) fn upsert(
        &self,
        target: &QualifiedPath,
        entry: &PathEntry,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        upsert_in_tx(self.tree, &entry_key(&self.id, target), entry)
    }

    pub(crate) fn delete(
        &self,
        target: &QualifiedPath,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        match self.tree.remove(entry_key(&self.id, target))? {
            Some(_) => Ok(()),
            None => Err(ConflictableTransactionError::Abort(Error::not_found(
                self.kind.label(),
                target.to_string(),
            ))),
        }
    }

    /// Add a reverse edge on `target`. A missing target aborts.
    pub(crate) fn add_referrer(
        &self,
        target: &QualifiedPath,
        source: &QualifiedPath,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        let mut entry = self.load(target)?;
        if entry.add_referrer(source) {
            self.upsert(target, &entry)?;
        }
        Ok(())
    }

    /// Remove a reverse edge from `target`. A missing target is ignored; a
    /// target that lacks the edge aborts.
    pub(crate) fn remove_referrer(
        &self,
        target: &QualifiedPath,
        source: &QualifiedPath,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        if let Some(mut entry) = self.get(target)? {
            if !entry.remove_referrer(source) {
                return Err(ConflictableTransactionError::Abort(missing_edge(target, source)));
            }
            self.upsert(target, &entry)?;
        }
        Ok(())
    }
}

fn missing_edge(target: &QualifiedPath, edge: &QualifiedPath) -> Error {
    Error::dependency(target, format!("edge {} is not recorded", edge))
}

fn get_in_tx(
    tree: &TransactionalTree,
    key: &[u8],
    kind: ObjectKind,
    target: &QualifiedPath,
) -> Result<Option<PathEntry>, ConflictableTransactionError<Error>> {
    match tree.get(key)? {
        Some(bytes) => PathEntry::from_bytes(&bytes)
            .map(Some)
            .map_err(|e| {
                ConflictableTransactionError::Abort(
                    e.context(format!("decoding {} directory entry {}", kind.label(), target)),
                )
            }),
        None => Ok(None),
    }
}

fn upsert_in_tx(
    tree: &TransactionalTree,
    key: &[u8],
    entry: &PathEntry,
) -> Result<(), ConflictableTransactionError<Error>> {
    let bytes = entry.to_bytes().map_err(ConflictableTransactionError::Abort)?;
    tree.insert(key, bytes)?;
    Ok(())
}
