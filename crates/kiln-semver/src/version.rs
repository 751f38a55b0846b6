//! Version parsing and ordering

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Error type for version and predicate parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("Could not parse version predicate \"{predicate}\": {reason}")]
    InvalidPredicate { predicate: String, reason: String },
}

lazy_static! {
    static ref SEMANTIC_RE: Regex = Regex::new(
        r"^(\d+(?:\.\d+)*)(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?$"
    ).unwrap();
}

/// A semantic version: numeric components, optional pre-release and build metadata.
///
/// Missing components compare as zero, so `1.2` and `1.2.0` are equal.
/// Build metadata is kept for display but ignored for ordering and equality.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    components: Vec<u64>,
    pre_release: Vec<String>,
    build: Option<String>,
}

impl SemanticVersion {
    /// Create a release version from numeric components
    pub fn new(components: Vec<u64>) -> Self {
        Self {
            components,
            pre_release: Vec::new(),
            build: None,
        }
    }

    /// Parse a semantic version, returning `None` if the string is not semver-like
    pub fn parse(version: &str) -> Option<Self> {
        let caps = SEMANTIC_RE.captures(version)?;

        let mut components = Vec::new();
        for part in caps.get(1)?.as_str().split('.') {
            components.push(part.parse::<u64>().ok()?);
        }

        let pre_release = caps
            .get(2)
            .map(|m| m.as_str().split('.').map(String::from).collect())
            .unwrap_or_default();

        Some(Self {
            components,
            pre_release,
            build: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }

    /// Numeric components as written
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Get a component, treating missing positions as zero
    pub fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }

    /// Pre-release identifiers (empty for a release)
    pub fn pre_release(&self) -> &[String] {
        &self.pre_release
    }

    /// Check if this is a pre-release version
    pub fn is_pre_release(&self) -> bool {
        !self.pre_release.is_empty()
    }

    /// Build metadata, if any
    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    /// The same version without pre-release or build metadata
    pub fn release(&self) -> Self {
        Self::new(self.components.clone())
    }

    /// First version of the next major line (`1.4.2` -> `2.0.0`)
    pub fn next_major(&self) -> Self {
        let mut components = vec![0; self.components.len().max(1)];
        components[0] = self.component(0).saturating_add(1);
        Self::new(components)
    }

    /// First version of the next minor line (`1.4.2` -> `1.5.0`)
    pub fn next_minor(&self) -> Self {
        let mut components = vec![0; self.components.len().max(2)];
        components[0] = self.component(0);
        components[1] = self.component(1).saturating_add(1);
        Self::new(components)
    }

    /// Components with trailing zeros removed, used for equality and hashing
    fn significant_components(&self) -> &[u64] {
        let end = self
            .components
            .iter()
            .rposition(|&c| c != 0)
            .map_or(0, |i| i + 1);
        &self.components[..end]
    }
}

/// Compare pre-release identifiers following semver 2.0 precedence rules
fn compare_pre_release(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    for (x, y) in a.iter().zip(b.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    a.len().cmp(&b.len())
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            match self.component(i).cmp(&other.component(i)) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        compare_pre_release(&self.pre_release, &other.pre_release)
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_components().hash(state);
        self.pre_release.hash(state);
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))?;
        if !self.pre_release.is_empty() {
            write!(f, "-{}", self.pre_release.join("."))?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

/// A mod version.
///
/// Versions are semantic when the string allows it and opaque otherwise.
/// Opaque versions sort below every semantic version and compare among
/// themselves by string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    Semantic(SemanticVersion),
    Opaque(String),
}

impl Version {
    /// Parse a version string
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(VersionError::InvalidVersion(version.to_string()));
        }

        Ok(match SemanticVersion::parse(version) {
            Some(semantic) => Version::Semantic(semantic),
            None => Version::Opaque(version.to_string()),
        })
    }

    /// Create a semantic release version from components
    pub fn from_components(components: &[u64]) -> Self {
        Version::Semantic(SemanticVersion::new(components.to_vec()))
    }

    /// Get the semantic representation, if any
    pub fn as_semantic(&self) -> Option<&SemanticVersion> {
        match self {
            Version::Semantic(v) => Some(v),
            Version::Opaque(_) => None,
        }
    }

    /// Check if this version is semantic
    pub fn is_semantic(&self) -> bool {
        matches!(self, Version::Semantic(_))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Version::Semantic(a), Version::Semantic(b)) => a.cmp(b),
            (Version::Opaque(a), Version::Opaque(b)) => a.cmp(b),
            (Version::Opaque(_), Version::Semantic(_)) => Ordering::Less,
            (Version::Semantic(_), Version::Opaque(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Semantic(v) => write!(f, "{}", v),
            Version::Opaque(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_semantic() {
        let version = v("1.2.3-beta.1+build.5");
        let semantic = version.as_semantic().unwrap();
        assert_eq!(semantic.components(), &[1, 2, 3]);
        assert_eq!(semantic.pre_release(), &["beta".to_string(), "1".to_string()]);
        assert_eq!(semantic.build(), Some("build.5"));
        assert_eq!(version.to_string(), "1.2.3-beta.1+build.5");
    }

    #[test]
    fn test_parse_opaque() {
        assert_eq!(v("snapshot-22w13a"), Version::Opaque("snapshot-22w13a".to_string()));
        assert_eq!(v("1.2.x"), Version::Opaque("1.2.x".to_string()));
        assert!(Version::parse("").is_err());
        assert!(Version::parse("   ").is_err());
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        assert_eq!(v("1.2"), v("1.2.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
        assert_ne!(v("1.2"), v("1.2.1"));
    }

    #[test]
    fn test_ordering() {
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("2.0.0-alpha") < v("2.0.0"));
        assert!(v("2.0.0-alpha") < v("2.0.0-alpha.1"));
        assert!(v("2.0.0-alpha.1") < v("2.0.0-beta"));
        assert!(v("2.0.0-2") < v("2.0.0-rc"));
        assert!(v("1.0.0+a") == v("1.0.0+b"));
    }

    #[test]
    fn test_opaque_sorts_below_semantic() {
        assert!(v("zzz") < v("0.0.1"));
        assert!(v("abc") < v("abd"));
    }

    #[test]
    fn test_next_major_minor() {
        let semantic = SemanticVersion::parse("1.4.2").unwrap();
        assert_eq!(semantic.next_major().to_string(), "2.0.0");
        assert_eq!(semantic.next_minor().to_string(), "1.5.0");

        let short = SemanticVersion::parse("3").unwrap();
        assert_eq!(short.next_minor().to_string(), "3.1");
    }

    #[test]
    fn test_hash_consistent_with_eq() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(v("1.2"));
        assert!(set.contains(&v("1.2.0")));
        assert!(!set.contains(&v("1.2.0-pre")));
    }
}
