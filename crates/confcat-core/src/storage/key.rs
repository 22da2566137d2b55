//! Key encoding for directory entries.

use std::fmt;
use std::str::FromStr;

use crate::path::{CatalogPath, QualifiedPath};

/// Size of a directory id in bytes.
pub const DIRECTORY_ID_SIZE: usize = 16;

/// Separator between namespace and path in entry keys.
const NAMESPACE_SEP: u8 = 0x00;

/// Opaque identifier of one path index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirectoryId(pub [u8; DIRECTORY_ID_SIZE]);

impl DirectoryId {
    /// Generate a fresh, unique id.
    pub fn generate() -> Self {
        Self(generate_id())
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; DIRECTORY_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for DirectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for DirectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirectoryId({})", self)
    }
}

impl FromStr for DirectoryId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("invalid id '{}': {}", s, e))?;
        let id: [u8; DIRECTORY_ID_SIZE] = bytes
            .try_into()
            .map_err(|_| format!("invalid id '{}': expected {} bytes", s, DIRECTORY_ID_SIZE))?;
        Ok(Self(id))
    }
}

/// Generate a new 16-byte id (UUID v4 layout).
pub fn generate_id() -> [u8; 16] {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    // Counter to ensure uniqueness even with same timestamp
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

    let mut id = [0u8; 16];
    id[..8].copy_from_slice(&now.to_le_bytes());
    id[8..16].copy_from_slice(&counter.to_le_bytes());

    // Set UUID version 4 bits
    id[6] = (id[6] & 0x0f) | 0x40;
    id[8] = (id[8] & 0x3f) | 0x80;

    id
}

/// Key of one entry.
///
/// Format: `[directory_id (16 bytes)][namespace][0x00][path]`
pub fn entry_key(dir: &DirectoryId, target: &QualifiedPath) -> Vec<u8> {
    let path = target.path.to_string();
    let mut key = namespace_prefix(dir, &target.namespace);
    key.extend_from_slice(path.as_bytes());
    key
}

/// Prefix shared by every entry of a namespace in a directory.
pub fn namespace_prefix(dir: &DirectoryId, namespace: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(DIRECTORY_ID_SIZE + namespace.len() + 1);
    key.extend_from_slice(dir.as_bytes());
    key.extend_from_slice(namespace.as_bytes());
    key.push(NAMESPACE_SEP);
    key
}

/// Prefix shared by every entry strictly below `parent`.
pub fn children_prefix(dir: &DirectoryId, namespace: &str, parent: &CatalogPath) -> Vec<u8> {
    let mut key = namespace_prefix(dir, namespace);
    if parent.is_root() {
        key.push(b'/');
    } else {
        key.extend_from_slice(parent.to_string().as_bytes());
        key.push(b'/');
    }
    key
}

/// Decode an entry key produced by [`entry_key`].
pub fn decode_entry_key(key: &[u8]) -> Option<QualifiedPath> {
    if key.len() <= DIRECTORY_ID_SIZE {
        return None;
    }
    let rest = &key[DIRECTORY_ID_SIZE..];
    let sep = rest.iter().position(|b| *b == NAMESPACE_SEP)?;
    let namespace = std::str::from_utf8(&rest[..sep]).ok()?;
    let path = std::str::from_utf8(&rest[sep + 1..]).ok()?;
    Some(QualifiedPath::new(namespace, CatalogPath::parse(path).ok()?))
}
