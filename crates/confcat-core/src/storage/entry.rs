//! Path entries: the binding of a path to an object hash plus its edges.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;
use crate::path::QualifiedPath;

/// The object bound to one path and the reference edges recorded on it.
///
/// Edges are stored as rendered [`QualifiedPath`]s, kept sorted and unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct PathEntry {
    /// Hash of the bound object.
    pub hash: String,
    /// Outgoing edges: objects this one depends on.
    pub references: Vec<String>,
    /// Reverse edges: objects that depend on this one.
    pub referrers: Vec<String>,
}

impl PathEntry {
    /// Create an entry without edges.
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            references: Vec::new(),
            referrers: Vec::new(),
        }
    }

    /// Replace the outgoing edges.
    pub fn with_references<'a>(mut self, refs: impl IntoIterator<Item = &'a QualifiedPath>) -> Self {
        let mut references: Vec<String> = refs.into_iter().map(|r| r.to_string()).collect();
        references.sort();
        references.dedup();
        self.references = references;
        self
    }

    /// Add an outgoing edge. Returns false if it was already present.
    pub fn add_reference(&mut self, target: &QualifiedPath) -> bool {
        insert_sorted(&mut self.references, target.to_string())
    }

    /// Remove an outgoing edge. Returns false if it was absent.
    pub fn remove_reference(&mut self, target: &QualifiedPath) -> bool {
        remove_sorted(&mut self.references, &target.to_string())
    }

    /// Add a reverse edge. Returns false if it was already present.
    pub fn add_referrer(&mut self, source: &QualifiedPath) -> bool {
        insert_sorted(&mut self.referrers, source.to_string())
    }

    /// Remove a reverse edge. Returns false if it was absent.
    pub fn remove_referrer(&mut self, source: &QualifiedPath) -> bool {
        remove_sorted(&mut self.referrers, &source.to_string())
    }

    /// Whether anything depends on this entry.
    pub fn is_referenced(&self) -> bool {
        !self.referrers.is_empty()
    }

    /// Outgoing edges, parsed.
    pub fn reference_paths(&self) -> Result<Vec<QualifiedPath>, Error> {
        parse_all(&self.references)
    }

    /// Reverse edges, parsed.
    pub fn referrer_paths(&self) -> Result<Vec<QualifiedPath>, Error> {
        parse_all(&self.referrers)
    }

    /// Serialize the entry to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize an entry from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

fn insert_sorted(list: &mut Vec<String>, item: String) -> bool {
    match list.binary_search(&item) {
        Ok(_) => false,
        Err(pos) => {
            list.insert(pos, item);
            true
        }
    }
}

fn remove_sorted(list: &mut Vec<String>, item: &str) -> bool {
    match list.binary_search_by(|s| s.as_str().cmp(item)) {
        Ok(pos) => {
            list.remove(pos);
            true
        }
        Err(_) => false,
    }
}

fn parse_all(list: &[String]) -> Result<Vec<QualifiedPath>, Error> {
    list.iter()
        .map(|s| QualifiedPath::parse(s).map_err(Error::Deserialization))
        .collect()
}
