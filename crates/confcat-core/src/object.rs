//! Immutable, content-addressed catalog objects.

use std::fmt;
use std::str::FromStr;

use rkyv::{Archive, Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::hashing;

/// Kind of a stored catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A typed leaf definition.
    ParameterSchema,
    /// A grouping of parameter slots.
    CollectionSchema,
    /// Concrete values bound to a collection schema.
    CollectionValue,
}

impl ObjectKind {
    /// Canonical name, as hashed.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::ParameterSchema => "ParameterSchema",
            ObjectKind::CollectionSchema => "CollectionSchema",
            ObjectKind::CollectionValue => "CollectionValue",
        }
    }

    /// Human readable name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::ParameterSchema => "parameter schema",
            ObjectKind::CollectionSchema => "collection schema",
            ObjectKind::CollectionValue => "collection value",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ParameterSchema" => Ok(ObjectKind::ParameterSchema),
            "CollectionSchema" => Ok(ObjectKind::CollectionSchema),
            "CollectionValue" => Ok(ObjectKind::CollectionValue),
            other => Err(format!("unsupported object kind '{}'", other)),
        }
    }
}

/// A stored blob: the semantic content of a schema or value, keyed by hash.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct CatalogObject {
    /// SHA-512 content hash, hex encoded.
    pub hash: String,
    /// Object kind.
    pub kind: ObjectKind,
    /// Schema format version.
    pub version: String,
    /// Canonical JSON bytes of the spec.
    pub payload: Vec<u8>,
    /// Human description.
    pub description: String,
}

impl CatalogObject {
    /// Build an object from its semantic fields, computing payload and hash.
    pub fn new(
        kind: ObjectKind,
        version: impl Into<String>,
        spec: &Value,
        description: impl Into<String>,
    ) -> Result<Self, Error> {
        let version = version.into();
        let description = description.into();
        let payload = hashing::to_canonical_bytes(spec)?;
        let hash = hashing::content_hash(kind, &version, spec, &description)?;
        Ok(Self {
            hash,
            kind,
            version,
            payload,
            description,
        })
    }

    /// Decode the spec payload.
    pub fn spec(&self) -> Result<Value, Error> {
        serde_json::from_slice(&self.payload).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Recompute the hash from the stored fields and compare.
    pub fn verify(&self) -> Result<bool, Error> {
        let spec = self.spec()?;
        let hash = hashing::content_hash(self.kind, &self.version, &spec, &self.description)?;
        Ok(hash == self.hash)
    }

    /// Serialize the object to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize an object from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        // sled hands out unaligned buffers; rkyv validation needs alignment.
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_roundtrip() {
        let spec = json!({"dataType": "Integer", "default": 3});
        let object = CatalogObject::new(ObjectKind::ParameterSchema, "v1", &spec, "retries").unwrap();

        let bytes = object.to_bytes().unwrap();
        let decoded = CatalogObject::from_bytes(&bytes).unwrap();

        assert_eq!(object, decoded);
        assert_eq!(decoded.spec().unwrap(), spec);
        assert!(decoded.verify().unwrap());
    }

    #[test]
    fn test_tampered_object_fails_verify() {
        let mut object =
            CatalogObject::new(ObjectKind::ParameterSchema, "v1", &json!({"a": 1}), "").unwrap();
        object.description = "changed".into();
        assert!(!object.verify().unwrap());
    }

    #[test]
    fn test_kind_names() {
        for kind in [
            ObjectKind::ParameterSchema,
            ObjectKind::CollectionSchema,
            ObjectKind::CollectionValue,
        ] {
            assert_eq!(kind.as_str().parse::<ObjectKind>().unwrap(), kind);
        }
        assert!("Widget".parse::<ObjectKind>().is_err());
    }
}
