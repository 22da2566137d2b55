//! Reference graph maintenance.
//!
//! Outgoing edges live on the referring entry, reverse edges on the target
//! entry. Every write that changes outgoing edges applies the matching
//! reverse-edge delta in the same transaction.

use std::collections::BTreeSet;

use sled::transaction::ConflictableTransactionError;
use tracing::debug;

use crate::error::{Error, ErrorKind};
use crate::path::QualifiedPath;
use crate::storage::TxDirectory;

/// Difference between two outgoing edge sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceDelta {
    /// Targets that gain a reverse edge.
    pub added: Vec<QualifiedPath>,
    /// Targets that lose a reverse edge.
    pub removed: Vec<QualifiedPath>,
}

impl ReferenceDelta {
    /// Compute the delta from `existing` to `new`.
    pub fn between(existing: &[QualifiedPath], new: &[QualifiedPath]) -> Self {
        let old: BTreeSet<&QualifiedPath> = existing.iter().collect();
        let new: BTreeSet<&QualifiedPath> = new.iter().collect();
        Self {
            added: new.difference(&old).map(|p| (*p).clone()).collect(),
            removed: old.difference(&new).map(|p| (*p).clone()).collect(),
        }
    }

    /// Whether nothing changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Apply the reverse edges for `source` to the target directory.
    ///
    /// A missing addition target aborts the transaction; a missing removal
    /// target is ignored.
    pub(crate) fn apply(
        &self,
        targets: &TxDirectory<'_>,
        source: &QualifiedPath,
    ) -> Result<(), ConflictableTransactionError<Error>> {
        for target in &self.removed {
            targets.remove_referrer(target, source)?;
        }
        for target in &self.added {
            targets.add_referrer(target, source).map_err(|e| match e {
                ConflictableTransactionError::Abort(err) if err.kind() == ErrorKind::NotFound => {
                    ConflictableTransactionError::Abort(Error::dependency(
                        source,
                        format!("referenced object {} no longer exists", target),
                    ))
                }
                other => other,
            })?;
        }
        if !self.is_empty() {
            debug!(
                source = %source,
                added = self.added.len(),
                removed = self.removed.len(),
                "applied reference delta"
            );
        }
        Ok(())
    }
}

/// Sort and dedup a resolved reference list.
pub fn normalize(mut refs: Vec<QualifiedPath>) -> Vec<QualifiedPath> {
    refs.sort();
    refs.dedup();
    refs
}
