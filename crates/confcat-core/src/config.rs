//! Engine and per-save configuration.

/// Default maximum number of segments in a full object path.
pub const DEFAULT_MAX_PATH_DEPTH: usize = 16;

/// Name of the variant created alongside every catalog.
pub const DEFAULT_VARIANT_NAME: &str = "default";

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// When false every object lives at `/` and closest-parent resolution
    /// becomes an exact-name lookup.
    pub hierarchical_paths: bool,

    /// Maximum number of segments in a full object path (name included).
    pub max_path_depth: usize,

    /// Variant created with each catalog and used when metadata names none.
    pub default_variant_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hierarchical_paths: true,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
            default_variant_name: DEFAULT_VARIANT_NAME.to_string(),
        }
    }
}

impl EngineConfig {
    /// Enable or disable hierarchical paths.
    pub fn with_hierarchical_paths(mut self, enabled: bool) -> Self {
        self.hierarchical_paths = enabled;
        self
    }

    /// Set the maximum path depth.
    pub fn with_max_path_depth(mut self, depth: usize) -> Self {
        self.max_path_depth = depth;
        self
    }

    /// Set the default variant name.
    pub fn with_default_variant_name(mut self, name: impl Into<String>) -> Self {
        self.default_variant_name = name.into();
        self
    }
}

/// Options for one save call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Run structural validation of metadata and spec.
    pub validate_structure: bool,

    /// Resolve references and revalidate dependents.
    pub validate_dependencies: bool,

    /// Fill unset slot values of a collection schema from the resolved types.
    pub set_defaults: bool,

    /// Fail if anything is already bound at the target path.
    pub error_if_exists: bool,

    /// Fail instead of succeeding silently when nothing would change.
    pub error_if_equal: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            validate_structure: true,
            validate_dependencies: true,
            set_defaults: false,
            error_if_exists: false,
            error_if_equal: false,
        }
    }
}

impl SaveOptions {
    /// Default options: validate everything, tolerate existing and equal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle structural validation.
    pub fn with_validate_structure(mut self, on: bool) -> Self {
        self.validate_structure = on;
        self
    }

    /// Toggle dependency validation.
    pub fn with_validate_dependencies(mut self, on: bool) -> Self {
        self.validate_dependencies = on;
        self
    }

    /// Toggle default filling.
    pub fn with_set_defaults(mut self, on: bool) -> Self {
        self.set_defaults = on;
        self
    }

    /// Toggle strict create.
    pub fn with_error_if_exists(mut self, on: bool) -> Self {
        self.error_if_exists = on;
        self
    }

    /// Toggle the no-op error.
    pub fn with_error_if_equal(mut self, on: bool) -> Self {
        self.error_if_equal = on;
        self
    }
}
