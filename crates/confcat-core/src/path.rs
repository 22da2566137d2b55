//! Hierarchical catalog paths.
//!
//! A [`CatalogPath`] is a list of validated segments. The root path has no
//! segments and renders as `/`. Joining and stripping segments never produces
//! doubled or trailing slashes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Namespace used when none is given.
pub const ROOT_NAMESPACE: &str = "_root";

/// Maximum length of a name or path segment.
pub const MAX_NAME_LEN: usize = 64;

/// Check a schema name, namespace or path segment.
///
/// Names start with an ASCII letter and continue with letters, digits, `_`
/// or `-`.
pub fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("must be at most {} characters", MAX_NAME_LEN));
    }
    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(format!("'{}' must start with a letter", name));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-')) {
        return Err(format!("'{}' contains invalid character '{}'", name, bad));
    }
    Ok(())
}

/// A `/`-delimited hierarchical path.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CatalogPath {
    segments: Vec<String>,
}

impl CatalogPath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path such as `/a/b`.
    ///
    /// Empty segments (from `//` or a trailing `/`) are dropped; every other
    /// segment must be a valid name.
    pub fn parse(s: &str) -> Result<Self, String> {
        if !s.starts_with('/') {
            return Err(format!("path '{}' must start with '/'", s));
        }
        let mut segments = Vec::new();
        for segment in s.split('/').filter(|seg| !seg.is_empty()) {
            check_name(segment).map_err(|e| format!("invalid segment in '{}': {}", s, e))?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Build a path from already split segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        for segment in segments {
            let segment = segment.into();
            check_name(&segment)?;
            out.push(segment);
        }
        Ok(Self { segments: out })
    }

    /// Whether this is `/`.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The path without its last segment. `None` for the root.
    pub fn parent(&self) -> Option<CatalogPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The last segment. `None` for the root.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Append one segment.
    ///
    /// The caller is responsible for the segment being a valid name.
    pub fn join(&self, segment: &str) -> CatalogPath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &CatalogPath) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// This path followed by each ancestor, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = CatalogPath> + '_ {
        (0..=self.segments.len()).rev().map(move |len| Self {
            segments: self.segments[..len].to_vec(),
        })
    }
}

impl fmt::Display for CatalogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CatalogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CatalogPath({})", self)
    }
}

impl FromStr for CatalogPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CatalogPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CatalogPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A namespace plus a full path; the identity of an object in a directory.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedPath {
    /// Namespace of the object.
    pub namespace: String,
    /// Full path of the object, including its own name as the last segment.
    pub path: CatalogPath,
}

impl QualifiedPath {
    /// Create a qualified path.
    pub fn new(namespace: impl Into<String>, path: CatalogPath) -> Self {
        Self {
            namespace: namespace.into(),
            path,
        }
    }

    /// Parse the `namespace:/a/b` form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let (namespace, path) = s
            .split_once(':')
            .ok_or_else(|| format!("qualified path '{}' is missing a namespace", s))?;
        if namespace != ROOT_NAMESPACE {
            check_name(namespace)?;
        }
        Ok(Self {
            namespace: namespace.to_string(),
            path: CatalogPath::parse(path)?,
        })
    }

    /// Name of the object (last path segment).
    pub fn name(&self) -> Option<&str> {
        self.path.leaf()
    }
}

impl fmt::Display for QualifiedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl fmt::Debug for QualifiedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedPath({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> CatalogPath {
        CatalogPath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_normalizes_slashes() {
        assert_eq!(p("/").to_string(), "/");
        assert_eq!(p("/a//b/").to_string(), "/a/b");
        assert_eq!(p("/a/b").depth(), 2);
        assert!(CatalogPath::parse("a/b").is_err());
        assert!(CatalogPath::parse("/a/1b").is_err());
        assert!(CatalogPath::parse("/a/..").is_err());
    }

    #[test]
    fn test_parent_leaf_join() {
        let path = p("/a/b");
        assert_eq!(path.leaf(), Some("b"));
        assert_eq!(path.parent().unwrap(), p("/a"));
        assert_eq!(p("/a").parent().unwrap(), CatalogPath::root());
        assert!(CatalogPath::root().parent().is_none());
        assert!(CatalogPath::root().leaf().is_none());
        assert_eq!(CatalogPath::root().join("x").to_string(), "/x");
        assert_eq!(path.join("c").to_string(), "/a/b/c");
    }

    #[test]
    fn test_is_ancestor_of() {
        assert!(CatalogPath::root().is_ancestor_of(&p("/a")));
        assert!(p("/a").is_ancestor_of(&p("/a/b/c")));
        assert!(!p("/a").is_ancestor_of(&p("/a")));
        assert!(!p("/a").is_ancestor_of(&p("/ab")));
        assert!(!p("/a/b").is_ancestor_of(&p("/a")));
    }

    #[test]
    fn test_ancestors_end_at_root() {
        let all: Vec<String> = p("/a/b").ancestors().map(|a| a.to_string()).collect();
        assert_eq!(all, vec!["/a/b", "/a", "/"]);

        let root: Vec<String> = CatalogPath::root().ancestors().map(|a| a.to_string()).collect();
        assert_eq!(root, vec!["/"]);
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("maxRetries").is_ok());
        assert!(check_name("db-pool_2").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("2fast").is_err());
        assert!(check_name("a b").is_err());
        assert!(check_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_qualified_path_display_parse() {
        let q = QualifiedPath::new(ROOT_NAMESPACE, p("/a/P"));
        assert_eq!(q.to_string(), "_root:/a/P");
        assert_eq!(QualifiedPath::parse("_root:/a/P").unwrap(), q);
        assert_eq!(q.name(), Some("P"));
        assert!(QualifiedPath::parse("/a/P").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&p("/a/b")).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: CatalogPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p("/a/b"));
        assert!(serde_json::from_str::<CatalogPath>("\"nope\"").is_err());
    }
}
