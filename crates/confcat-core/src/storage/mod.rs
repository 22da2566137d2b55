//! Storage layer for catalog objects and path entries.
//!
//! All data lives in one sled database:
//! - `catalog:objects`: content hash -> rkyv encoded [`CatalogObject`](crate::object::CatalogObject)
//! - `catalog:entries`: directory id + namespace + path -> rkyv encoded [`PathEntry`]
//! - `scope:*`: catalogs, variants and workspaces (see [`crate::scope`])

mod blob;
mod config;
mod directory;
mod engine;
mod entry;
pub mod key;

pub use blob::{BlobStore, PutOutcome, OBJECT_TREE};
pub use config::StorageConfig;
pub use directory::{Directory, ENTRY_TREE};
pub use engine::{CatalogStore, ScopeView};
pub use entry::PathEntry;
pub use key::DirectoryId;

pub(crate) use directory::TxDirectory;
