//! Mod descriptor model and `kiln.mod.json` parsing.
//!
//! Two schema versions are understood. Version 1 is the current layout;
//! version 0 is the legacy layout and is normalized into the same model
//! before anything else sees it.

use std::fmt;

use indexmap::IndexMap;
use kiln_semver::{Version, VersionError, VersionPredicate};
use serde::{Deserialize, Serialize};

/// Relationship a mod declares towards another identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKind {
    /// Hard positive: a matching mod must be selected
    Depends,
    /// Soft positive: a matching mod should be selected
    Recommends,
    /// Informational only
    Suggests,
    /// Soft negative: a matching mod should not be selected
    Conflicts,
    /// Hard negative: a matching mod must not be selected
    Breaks,
}

impl DependencyKind {
    /// Natural language verb used in diagnostics
    pub fn description(&self) -> &'static str {
        match self {
            DependencyKind::Depends => "requires",
            DependencyKind::Recommends => "recommends",
            DependencyKind::Suggests => "suggests",
            DependencyKind::Conflicts => "conflicts with",
            DependencyKind::Breaks => "is incompatible with",
        }
    }

    /// Check if the relationship asks for the target to be present
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            DependencyKind::Depends | DependencyKind::Recommends | DependencyKind::Suggests
        )
    }

    /// Check if a violation makes the mod set unusable
    pub fn is_hard(&self) -> bool {
        matches!(self, DependencyKind::Depends | DependencyKind::Breaks)
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One declared dependency edge
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub kind: DependencyKind,
    /// Identifier of the target
    pub target: String,
    pub predicate: VersionPredicate,
}

impl Dependency {
    /// Create a new dependency
    pub fn new(kind: DependencyKind, target: impl Into<String>, predicate: VersionPredicate) -> Self {
        Self {
            kind,
            target: target.into(),
            predicate,
        }
    }

    /// Check if a target version satisfies the predicate
    pub fn matches(&self, version: &Version) -> bool {
        self.predicate.matches(version)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.target, self.predicate)
    }
}

/// When a mod should be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadCondition {
    /// Must load, fail resolution otherwise
    Always,
    /// Load unless something prevents it
    IfPossible,
    /// Load only when another selected mod pulls it in
    IfRecommended,
}

/// Errors raised while reading a descriptor
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported schema version {0}")]
    UnsupportedSchema(u64),

    #[error("Invalid version: {0}")]
    Version(#[from] VersionError),

    #[error("Invalid version predicate for \"{target}\": {source}")]
    Predicate {
        target: String,
        #[source]
        source: VersionError,
    },
}

/// Normalized mod descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModMetadata {
    pub id: String,
    pub version: Version,
    /// Additional identifiers this mod satisfies
    pub provides: Vec<String>,
    /// Dependencies in declaration order
    pub dependencies: Vec<Dependency>,
    /// Paths of nested archives inside this mod's container
    pub nested: Vec<String>,
    /// Explicit load condition; `None` derives it from nesting
    pub load_condition: Option<LoadCondition>,
    pub schema_version: u64,
}

impl ModMetadata {
    /// Create a new descriptor with no relationships
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            provides: Vec::new(),
            dependencies: Vec::new(),
            nested: Vec::new(),
            load_condition: None,
            schema_version: 1,
        }
    }

    /// Add an alias
    pub fn with_provides(mut self, alias: impl Into<String>) -> Self {
        self.provides.push(alias.into());
        self
    }

    /// Add a dependency
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Add a nested archive path
    pub fn with_nested(mut self, path: impl Into<String>) -> Self {
        self.nested.push(path.into());
        self
    }

    /// Set an explicit load condition
    pub fn with_load_condition(mut self, condition: LoadCondition) -> Self {
        self.load_condition = Some(condition);
        self
    }

    /// Dependencies of one kind
    pub fn dependencies_of(&self, kind: DependencyKind) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(move |d| d.kind == kind)
    }

    /// Parse a descriptor from JSON text
    pub fn parse(content: &str) -> Result<Self, MetadataError> {
        let header: SchemaHeader = serde_json::from_str(content)?;
        match header.schema_version {
            0 => serde_json::from_str::<LegacyDescriptor>(content)?.normalize(),
            1 => serde_json::from_str::<Descriptor>(content)?.normalize(),
            other => Err(MetadataError::UnsupportedSchema(other)),
        }
    }
}

#[derive(Deserialize)]
struct SchemaHeader {
    #[serde(rename = "schemaVersion", default)]
    schema_version: u64,
}

/// Predicate as written: a single string or a list of alternatives
#[derive(Deserialize)]
#[serde(untagged)]
enum PredicateSpec {
    One(String),
    Many(Vec<String>),
}

impl PredicateSpec {
    fn parse(&self, target: &str) -> Result<VersionPredicate, MetadataError> {
        let result = match self {
            PredicateSpec::One(s) => VersionPredicate::parse(s),
            PredicateSpec::Many(list) => VersionPredicate::parse_all(list),
        };
        result.map_err(|source| MetadataError::Predicate {
            target: target.to_string(),
            source,
        })
    }
}

type DependencyMap = IndexMap<String, PredicateSpec>;

fn push_dependencies(
    out: &mut Vec<Dependency>,
    kind: DependencyKind,
    map: &DependencyMap,
) -> Result<(), MetadataError> {
    for (target, spec) in map {
        out.push(Dependency::new(kind, target.clone(), spec.parse(target)?));
    }
    Ok(())
}

#[derive(Deserialize)]
struct NestedEntry {
    file: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    id: String,
    version: String,
    #[serde(default)]
    provides: Vec<String>,
    #[serde(default)]
    depends: DependencyMap,
    #[serde(default)]
    recommends: DependencyMap,
    #[serde(default)]
    suggests: DependencyMap,
    #[serde(default)]
    conflicts: DependencyMap,
    #[serde(default)]
    breaks: DependencyMap,
    #[serde(default)]
    nested: Vec<NestedEntry>,
    #[serde(default)]
    load_condition: Option<LoadCondition>,
}

impl Descriptor {
    fn normalize(self) -> Result<ModMetadata, MetadataError> {
        let mut dependencies = Vec::new();
        push_dependencies(&mut dependencies, DependencyKind::Depends, &self.depends)?;
        push_dependencies(&mut dependencies, DependencyKind::Recommends, &self.recommends)?;
        push_dependencies(&mut dependencies, DependencyKind::Suggests, &self.suggests)?;
        push_dependencies(&mut dependencies, DependencyKind::Conflicts, &self.conflicts)?;
        push_dependencies(&mut dependencies, DependencyKind::Breaks, &self.breaks)?;

        Ok(ModMetadata {
            id: self.id,
            version: Version::parse(&self.version)?,
            provides: self.provides,
            dependencies,
            nested: self.nested.into_iter().map(|n| n.file).collect(),
            load_condition: self.load_condition,
            schema_version: 1,
        })
    }
}

/// Schema 0: `requires` are hard dependencies, `conflicts` are hard breaks
#[derive(Deserialize)]
struct LegacyDescriptor {
    id: String,
    version: String,
    #[serde(default)]
    requires: DependencyMap,
    #[serde(default)]
    conflicts: DependencyMap,
    #[serde(default)]
    nested: Vec<String>,
}

impl LegacyDescriptor {
    fn normalize(self) -> Result<ModMetadata, MetadataError> {
        let mut dependencies = Vec::new();
        push_dependencies(&mut dependencies, DependencyKind::Depends, &self.requires)?;
        push_dependencies(&mut dependencies, DependencyKind::Breaks, &self.conflicts)?;

        Ok(ModMetadata {
            id: self.id,
            version: Version::parse(&self.version)?,
            provides: Vec::new(),
            dependencies,
            nested: self.nested,
            load_condition: None,
            schema_version: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_current_schema() {
        let json = r#"{
            "schemaVersion": 1,
            "id": "example",
            "version": "1.2.0",
            "provides": ["example-api"],
            "depends": { "base": ">=1.0", "lib": ["1.x", "3.0"] },
            "recommends": { "extras": "*" },
            "breaks": { "old-example": "<2.0" },
            "nested": [{ "file": "META-INF/jars/lib.jar" }],
            "loadCondition": "if_possible"
        }"#;

        let metadata = ModMetadata::parse(json).unwrap();
        assert_eq!(metadata.id, "example");
        assert_eq!(metadata.version, Version::parse("1.2").unwrap());
        assert_eq!(metadata.provides, vec!["example-api"]);
        assert_eq!(metadata.nested, vec!["META-INF/jars/lib.jar"]);
        assert_eq!(metadata.load_condition, Some(LoadCondition::IfPossible));

        let kinds: Vec<_> = metadata.dependencies.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DependencyKind::Depends,
                DependencyKind::Depends,
                DependencyKind::Recommends,
                DependencyKind::Breaks,
            ]
        );
        assert_eq!(metadata.dependencies[1].target, "lib");
        assert_eq!(metadata.dependencies[1].predicate.terms().len(), 2);
    }

    #[test]
    fn test_parse_legacy_schema() {
        let json = r#"{
            "id": "legacy",
            "version": "0.3",
            "requires": { "base": "^1.0" },
            "conflicts": { "other": "*" },
            "nested": ["libs/inner.jar"]
        }"#;

        let metadata = ModMetadata::parse(json).unwrap();
        assert_eq!(metadata.schema_version, 0);
        assert_eq!(metadata.dependencies[0].kind, DependencyKind::Depends);
        assert_eq!(metadata.dependencies[1].kind, DependencyKind::Breaks);
        assert_eq!(metadata.nested, vec!["libs/inner.jar"]);
        assert!(metadata.load_condition.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(ModMetadata::parse("{"), Err(MetadataError::Json(_))));
        assert!(matches!(
            ModMetadata::parse(r#"{"schemaVersion": 7, "id": "x", "version": "1"}"#),
            Err(MetadataError::UnsupportedSchema(7))
        ));
        assert!(matches!(
            ModMetadata::parse(r#"{"schemaVersion": 1, "id": "ab", "version": "1", "depends": {"c": ">="}}"#),
            Err(MetadataError::Predicate { .. })
        ));
    }

    #[test]
    fn test_kind_descriptions() {
        assert_eq!(DependencyKind::Depends.to_string(), "requires");
        assert_eq!(DependencyKind::Breaks.to_string(), "is incompatible with");
        assert!(DependencyKind::Recommends.is_positive());
        assert!(!DependencyKind::Conflicts.is_hard());
    }
}
