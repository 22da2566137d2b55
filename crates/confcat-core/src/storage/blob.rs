//! Append-only, content-addressed object storage.

use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::Tree;

use crate::error::{Error, ResultExt};
use crate::object::CatalogObject;

/// Tree name for catalog objects.
pub const OBJECT_TREE: &str = "catalog:objects";

/// Outcome of inserting a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The object was new and has been stored.
    Created,
    /// An object with the same hash was already stored.
    AlreadyExists,
}

/// Blob store over the object tree. Objects are keyed by content hash and
/// never overwritten.
#[derive(Clone)]
pub struct BlobStore {
    tree: Tree,
}

impl BlobStore {
    /// Create a blob store backed by the given tree.
    pub fn new(tree: Tree) -> Self {
        Self { tree }
    }

    /// Insert an object unless one with the same hash exists.
    pub fn put(&self, object: &CatalogObject) -> Result<PutOutcome, Error> {
        let bytes = object.to_bytes()?;
        let swapped = self
            .tree
            .compare_and_swap(object.hash.as_bytes(), None as Option<&[u8]>, Some(bytes))
            .with_context(|| format!("storing object {}", object.hash))?;
        match swapped {
            Ok(()) => Ok(PutOutcome::Created),
            Err(_) => Ok(PutOutcome::AlreadyExists),
        }
    }

    /// Get an object by hash.
    pub fn get(&self, hash: &str) -> Result<Option<CatalogObject>, Error> {
        match self
            .tree
            .get(hash.as_bytes())
            .with_context(|| format!("reading object {}", hash))?
        {
            Some(bytes) => Ok(Some(
                CatalogObject::from_bytes(&bytes)
                    .with_context(|| format!("decoding object {}", hash))?,
            )),
            None => Ok(None),
        }
    }

    /// Get an object by hash, failing if absent.
    pub fn load(&self, hash: &str) -> Result<CatalogObject, Error> {
        self.get(hash)?
            .ok_or_else(|| Error::not_found("catalog object", hash))
    }

    /// Whether an object with this hash is stored.
    pub fn contains(&self, hash: &str) -> Result<bool, Error> {
        self.tree
            .contains_key(hash.as_bytes())
            .with_context(|| format!("reading object {}", hash))
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Insert an object inside a transaction unless its hash is already stored.
pub(crate) fn put_in_tx(
    tree: &TransactionalTree,
    object: &CatalogObject,
) -> Result<PutOutcome, ConflictableTransactionError<Error>> {
    if tree.get(object.hash.as_bytes())?.is_some() {
        return Ok(PutOutcome::AlreadyExists);
    }
    let bytes = object
        .to_bytes()
        .map_err(ConflictableTransactionError::Abort)?;
    tree.insert(object.hash.as_bytes(), bytes)?;
    Ok(PutOutcome::Created)
}
