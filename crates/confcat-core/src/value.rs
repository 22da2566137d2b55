//! Optional JSON values for defaults and overrides.
//!
//! Three states matter to validation and are kept apart:
//! - unset: the field was absent
//! - explicit null: the field was present and `null`
//! - a typed value

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::hashing;

/// Typed extraction failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    /// The value is unset or null.
    #[error("value is not set")]
    Unset,
    /// The value does not have the requested type.
    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        /// Requested Rust type.
        expected: &'static str,
        /// The raw JSON that was found.
        found: String,
    },
}

/// A JSON value that may be unset, explicitly null, or set.
///
/// Stored as canonical JSON bytes plus a validity flag: unset has no bytes,
/// null has bytes `null` and is not valid, a set value is valid.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct OptionalValue {
    raw: Vec<u8>,
    valid: bool,
}

impl OptionalValue {
    /// The unset value.
    pub fn unset() -> Self {
        Self::default()
    }

    /// An explicit null.
    pub fn null() -> Self {
        Self {
            raw: b"null".to_vec(),
            valid: false,
        }
    }

    /// Wrap a JSON value. `Value::Null` becomes an explicit null.
    pub fn from_json(value: &Value) -> Self {
        if value.is_null() {
            return Self::null();
        }
        match hashing::to_canonical_bytes(value) {
            Ok(raw) => Self { raw, valid: true },
            // Non-finite numbers cannot come out of JSON parsing.
            Err(_) => Self::null(),
        }
    }

    /// Serialize any value into an optional value.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_value(value)?;
        Ok(Self::from_json(&json))
    }

    /// Whether the field was present at all.
    pub fn is_set(&self) -> bool {
        !self.raw.is_empty()
    }

    /// Whether the field was absent.
    pub fn is_unset(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether the field was present and null.
    pub fn is_null(&self) -> bool {
        !self.raw.is_empty() && !self.valid
    }

    /// Whether the field carries a non-null value.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Canonical bytes (empty when unset).
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The JSON value, `None` when unset or null.
    pub fn as_json(&self) -> Option<Value> {
        if !self.valid {
            return None;
        }
        serde_json::from_slice(&self.raw).ok()
    }

    /// Extract as a concrete type.
    pub fn get_as<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        if !self.valid {
            return Err(ValueError::Unset);
        }
        serde_json::from_slice(&self.raw).map_err(|_| ValueError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: String::from_utf8_lossy(&self.raw).into_owned(),
        })
    }

    /// Use `self` if it carries a value, otherwise `other`.
    pub fn or(self, other: OptionalValue) -> OptionalValue {
        if self.valid {
            self
        } else {
            other
        }
    }
}

impl fmt::Debug for OptionalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            f.write_str("Unset")
        } else {
            write!(f, "{}", String::from_utf8_lossy(&self.raw))
        }
    }
}

impl From<Value> for OptionalValue {
    fn from(value: Value) -> Self {
        Self::from_json(&value)
    }
}

impl Serialize for OptionalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_json() {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for OptionalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only called when the field is present; absent fields use `Default`.
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}
