//! Core error types.

use std::fmt;

use thiserror::Error;

/// Core catalog errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Object, path, catalog, variant or workspace absent.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What was looked up.
        kind: &'static str,
        /// The name, path or id that was not found.
        name: String,
    },

    /// Duplicate create with strict semantics requested.
    #[error("{kind} already exists: {name}")]
    AlreadyExists {
        /// What was created.
        kind: &'static str,
        /// The conflicting name or path.
        name: String,
    },

    /// The save produced the same hash and references as the stored entry.
    #[error("no changes to save for {kind} at {path}")]
    NoOp {
        /// Object kind.
        kind: &'static str,
        /// Path of the unchanged object.
        path: String,
    },

    /// Malformed spec, missing fields or unsupported kind/version.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A referenced schema is missing or a value fails the target's constraints.
    #[error("dependency validation failed for {path}: {message}")]
    Dependency {
        /// Path whose dependency failed.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// Attempt to rebind a collection value to a different schema.
    #[error("collection value {path} is bound to {existing} and cannot be rebound to {requested}")]
    Immutable {
        /// Path of the collection value.
        path: String,
        /// Schema it is bound to.
        existing: String,
        /// Schema the caller asked for.
        requested: String,
    },

    /// Delete blocked by existing reverse references or nested children.
    #[error("cannot delete {path}: still referenced by {}", .blockers.join(", "))]
    DeletionConflict {
        /// Path that was to be deleted.
        path: String,
        /// Paths holding references to it.
        blockers: Vec<String>,
    },

    /// Invalid catalog, variant or workspace.
    #[error("scope resolution failed: {0}")]
    Scope(String),

    /// An error annotated with the operation that produced it.
    #[error("{context}: {source}")]
    Context {
        /// Operation context (directory kind and path).
        context: String,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl From<sled::transaction::TransactionError<Error>> for Error {
    fn from(err: sled::transaction::TransactionError<Error>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => Error::Storage(e),
        }
    }
}

/// Coarse classification of [`Error`], independent of context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Storage or encoding failure.
    Storage,
    /// Something was not found.
    NotFound,
    /// Strict create on an existing object.
    AlreadyExists,
    /// Save would not change anything.
    NoOp,
    /// Structural validation failure.
    Validation,
    /// Dependency validation failure.
    Dependency,
    /// Immutable field changed.
    Immutable,
    /// Delete blocked.
    DeletionConflict,
    /// Scope lookup failure.
    Scope,
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create a dependency validation error.
    pub fn dependency(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Dependency {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Wrap this error with operation context.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error, looking through context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Storage(_) | Error::Serialization(_) | Error::Deserialization(_) => {
                ErrorKind::Storage
            }
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::NoOp { .. } => ErrorKind::NoOp,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Dependency { .. } => ErrorKind::Dependency,
            Error::Immutable { .. } => ErrorKind::Immutable,
            Error::DeletionConflict { .. } => ErrorKind::DeletionConflict,
            Error::Scope(_) => ErrorKind::Scope,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, with context wrappers removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach context to storage failures.
pub trait ResultExt<T> {
    /// Wrap storage-level errors with the given context, lazily built.
    fn with_context<F, S>(self, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: Into<Error>> ResultExt<T> for Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| {
            let err = e.into();
            match err.kind() {
                ErrorKind::Storage => err.context(f()),
                _ => err,
            }
        })
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human readable message.
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// A batch of validation failures collected across independent fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Record failures reported relative to `prefix`.
    pub fn extend_prefixed(&mut self, prefix: &str, errors: impl IntoIterator<Item = FieldError>) {
        for err in errors {
            let field = match (prefix.is_empty(), err.field.is_empty()) {
                (true, _) => err.field,
                (false, true) => prefix.to_string(),
                (false, false) => format!("{}.{}", prefix, err.field),
            };
            self.errors.push(FieldError::new(field, err.message));
        }
    }

    /// Whether no failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over recorded failures.
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Whether some failure refers to `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` if empty, otherwise the batch itself.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// `Ok(())` if empty, otherwise [`Error::Validation`].
    pub fn into_result(self) -> Result<(), Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(err: FieldError) -> Self {
        Self { errors: vec![err] }
    }
}

/// Result alias for core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
