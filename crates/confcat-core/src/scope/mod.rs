//! Tenant scopes: catalogs, their variants and the workspace of each variant.
//!
//! A workspace is the mutable editing context of one catalog/variant pair and
//! owns three directories (parameters, collections, values).

mod registry;

use std::fmt;
use std::str::FromStr;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;
use crate::object::ObjectKind;
use crate::storage::key::{generate_id, DirectoryId};

pub use registry::{ScopeRegistry, CATALOG_TREE, VARIANT_TREE, WORKSPACE_TREE};

/// Opaque workspace identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkspaceId(pub [u8; 16]);

impl WorkspaceId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(generate_id())
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkspaceId({})", self)
    }
}

impl FromStr for WorkspaceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: DirectoryId = s
            .parse()
            .map_err(|e: String| Error::Scope(format!("invalid workspace id: {}", e)))?;
        Ok(Self(id.0))
    }
}

/// A tenant catalog.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog name.
    pub name: String,
    /// Human description.
    pub description: String,
    /// Variant used when metadata does not name one.
    pub default_variant: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

/// A named variant of a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Variant {
    /// Owning catalog.
    pub catalog: String,
    /// Variant name.
    pub name: String,
    /// The variant's workspace, once created.
    pub workspace: Option<[u8; 16]>,
}

impl Variant {
    /// Id of the variant's workspace.
    pub fn workspace_id(&self) -> Option<WorkspaceId> {
        self.workspace.map(WorkspaceId)
    }
}

/// The editing scope of one catalog/variant.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Workspace {
    /// Workspace id.
    pub id: [u8; 16],
    /// Owning catalog.
    pub catalog: String,
    /// Owning variant.
    pub variant: String,
    /// Directory of parameter schemas.
    pub parameters: [u8; 16],
    /// Directory of collection schemas.
    pub collections: [u8; 16],
    /// Directory of collection values.
    pub values: [u8; 16],
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl Workspace {
    pub(crate) fn new(catalog: &str, variant: &str) -> Self {
        Self {
            id: WorkspaceId::generate().0,
            catalog: catalog.to_string(),
            variant: variant.to_string(),
            parameters: generate_id(),
            collections: generate_id(),
            values: generate_id(),
            created_at: now_millis(),
        }
    }

    /// The workspace id.
    pub fn workspace_id(&self) -> WorkspaceId {
        WorkspaceId(self.id)
    }

    /// Directory holding objects of `kind`.
    pub fn directory(&self, kind: ObjectKind) -> DirectoryId {
        match kind {
            ObjectKind::ParameterSchema => DirectoryId(self.parameters),
            ObjectKind::CollectionSchema => DirectoryId(self.collections),
            ObjectKind::CollectionValue => DirectoryId(self.values),
        }
    }
}

macro_rules! record_codec {
    ($ty:ty) => {
        impl $ty {
            /// Serialize to bytes using rkyv.
            pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
                rkyv::to_bytes::<rkyv::rancor::Error>(self)
                    .map(|v| v.to_vec())
                    .map_err(|e| Error::Serialization(e.to_string()))
            }

            /// Deserialize from bytes using rkyv.
            pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
                let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
                aligned.extend_from_slice(bytes);
                rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
                    .map_err(|e| Error::Deserialization(e.to_string()))
            }
        }
    };
}

record_codec!(Catalog);
record_codec!(Variant);
record_codec!(Workspace);

pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
